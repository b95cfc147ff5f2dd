pub mod carta;
pub mod http;

pub use carta::{CartaClient, LetterService, SendFinalStatus};
pub use http::{HttpClient, HttpResponse, get_shared_tls_config};
