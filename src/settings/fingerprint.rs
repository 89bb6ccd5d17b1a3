use serde::Serialize;

/// 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over UTF-16 code units,
/// rendered as signed lowercase hex.
pub fn fingerprint_str(text: &str) -> String {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32));

    if hash < 0 {
        format!("-{:x}", (hash as i64).unsigned_abs())
    } else {
        format!("{:x}", hash)
    }
}

/// Fingerprint of the compact JSON form of `value`.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(fingerprint_str(&serde_json::to_string(value)?))
}
