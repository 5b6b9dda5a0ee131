mod error;
mod forms;
mod transport;

pub mod prelude {
    pub use crate::error::FormError;
    pub use crate::forms::{
        ContactForm, FormClient, LoginForm, SubmissionOutcome, CONTACT_PATH, LOGIN_PATH,
    };
    pub use crate::transport::ReqwestTransport;

    // The transport seam lives in the core crate, re-export it so scenarios only need this one.
    pub use gale_core::prelude::{HttpMethod, HttpRequest, HttpResponse, RequestMeta, Transport};
}
