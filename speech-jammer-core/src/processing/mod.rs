pub mod delay_line;
pub mod pcm;
pub mod wav_format;
