pub mod analysis;
pub mod decode;
pub mod features;
pub mod spectral;
pub mod stats;
pub mod stft;
pub mod tags;
