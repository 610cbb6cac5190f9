pub mod cert;
pub mod cms;

pub use cert::{Certificate, CertificateHandle};
pub use cms::certificates_from_cms;
