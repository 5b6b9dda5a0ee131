use crate::error::FormError;
use gale_core::prelude::{HttpMethod, HttpRequest, RequestMeta, Transport};
use serde::Serialize;

pub const LOGIN_PATH: &str = "/api/login";
pub const CONTACT_PATH: &str = "/api/contact";

#[derive(Debug, Clone, Serialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// What the server made of a submitted form. The caller decides how to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The server answered with a 2xx status.
    Accepted,
    /// The server answered with any other status.
    Rejected { status: u16 },
}

impl SubmissionOutcome {
    fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            SubmissionOutcome::Accepted
        } else {
            SubmissionOutcome::Rejected { status }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted)
    }

    /// Message to show after a login attempt.
    pub fn login_message(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted => "Login successful!",
            SubmissionOutcome::Rejected { .. } => "Invalid credentials",
        }
    }

    /// Message to show after a contact form submission.
    pub fn contact_message(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted => "Message sent!",
            SubmissionOutcome::Rejected { .. } => "Something went wrong.",
        }
    }
}

/// Submits the login and contact forms of the site.
pub struct FormClient<T: Transport> {
    transport: T,
}

impl<T: Transport> FormClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn submit_login(&self, form: &LoginForm) -> Result<SubmissionOutcome, FormError> {
        self.submit(LOGIN_PATH, serde_json::to_value(form)?).await
    }

    pub async fn submit_contact(
        &self,
        form: &ContactForm,
    ) -> Result<SubmissionOutcome, FormError> {
        self.submit(CONTACT_PATH, serde_json::to_value(form)?).await
    }

    async fn submit(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<SubmissionOutcome, FormError> {
        let request = HttpRequest {
            method: HttpMethod::Post,
            path: path.to_string(),
            body: Some(body),
        };
        let meta = RequestMeta {
            vu_id: 0,
            iteration: 0,
            active_vus: 1,
        };

        let response = self.transport.send(&request, meta).await?;
        log::debug!("Form submitted to {path}, status {}", response.status);

        Ok(SubmissionOutcome::from_status(response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::ReqwestTransport;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(mock_server: &MockServer) -> FormClient<ReqwestTransport> {
        FormClient::new(ReqwestTransport::new(&mock_server.uri(), Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn login_accepted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(serde_json::json!({"username": "admin", "password": "1234"})))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server)
            .await
            .submit_login(&LoginForm {
                username: "admin".to_string(),
                password: "1234".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(SubmissionOutcome::Accepted, outcome);
        assert_eq!("Login successful!", outcome.login_message());
    }

    #[tokio::test]
    async fn login_rejected_with_unauthorized() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server)
            .await
            .submit_login(&LoginForm {
                username: "admin".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(SubmissionOutcome::Rejected { status: 401 }, outcome);
        assert_eq!("Invalid credentials", outcome.login_message());
    }

    #[tokio::test]
    async fn contact_created_counts_as_accepted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONTACT_PATH))
            .and(body_json(serde_json::json!({
                "name": "Eddie",
                "email": "a@b.com",
                "message": "Hello from QA site!"
            })))
            .respond_with(ResponseTemplate::new(201))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server)
            .await
            .submit_contact(&ContactForm {
                name: "Eddie".to_string(),
                email: "a@b.com".to_string(),
                message: "Hello from QA site!".to_string(),
            })
            .await
            .unwrap();

        assert!(outcome.is_accepted());
        assert_eq!("Message sent!", outcome.contact_message());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        // Nothing listens on the discard port.
        let client = FormClient::new(
            ReqwestTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap(),
        );

        let result = client
            .submit_contact(&ContactForm {
                name: "Eddie".to_string(),
                email: "a@b.com".to_string(),
                message: "Hello from QA site!".to_string(),
            })
            .await;

        assert!(matches!(result, Err(FormError::Transport(_))));
    }
}
