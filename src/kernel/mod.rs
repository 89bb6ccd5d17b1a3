pub mod bus;
pub mod cancel;
pub mod classifier;
pub mod creator_config;
pub mod event;
pub mod observer;
pub mod overlay;
pub mod scheduler;
pub mod time;
pub mod video_change;
pub mod volume;
