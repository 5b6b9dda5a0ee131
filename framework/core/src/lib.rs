mod shutdown;
mod transport;

pub mod prelude {
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
    pub use crate::transport::{
        HttpMethod, HttpRequest, HttpResponse, RequestMeta, Transport, TransportError,
        TransportFuture,
    };
}
