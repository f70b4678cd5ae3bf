pub mod audio_device;
pub mod jammer_delegate;
