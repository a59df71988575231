//! Escalation of unanswered visitor questions to the team by email.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::Tool;
use crate::llm::ToolDefinition;
use crate::mail::{Mailer, OutgoingEmail};

pub const TOOL_NAME: &str = "notify_team";

const SUCCESS_MESSAGE: &str =
    "Thanks! Your question has been passed to the team and someone will get back to you shortly.";
const FAILURE_MESSAGE: &str =
    "Sorry, I couldn't reach the team right now. Please try again later or use the contact page.";

/// Arguments the model supplies when escalating a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadNotification {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub question: String,
}

impl LeadNotification {
    fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    fn phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    fn render(&self) -> String {
        let mut body = String::from("A website visitor asked a question the concierge could not answer.\n\n");
        body.push_str(&format!("Question:\n{}\n\n", self.question.trim()));
        body.push_str(&format!("Email: {}\n", self.email().unwrap_or("not provided")));
        body.push_str(&format!("Phone: {}\n", self.phone().unwrap_or("not provided")));
        if self.email().is_none() && self.phone().is_none() {
            body.push_str("\nNo contact details were given.\n");
        }
        body
    }
}

/// Sends one email per invocation to a fixed operator inbox.
pub struct LeadNotificationTool {
    mailer: Arc<dyn Mailer>,
    inbox: String,
}

impl LeadNotificationTool {
    pub fn new(mailer: Arc<dyn Mailer>, inbox: impl Into<String>) -> Self {
        Self { mailer, inbox: inbox.into() }
    }

    pub async fn notify(&self, lead: &LeadNotification) -> Value {
        if lead.email().is_none() && lead.phone().is_none() {
            warn!("lead escalated without contact details");
        }

        let email = OutgoingEmail {
            to: self.inbox.clone(),
            subject: "New question from the website concierge".to_owned(),
            text: lead.render(),
            reply_to: lead.email().map(str::to_owned),
        };

        match self.mailer.send(email).await {
            Ok(()) => {
                info!(inbox = %self.inbox, "lead notification sent");
                json!({ "success": true, "message": SUCCESS_MESSAGE })
            }
            Err(e) => {
                error!(error = %e, "lead notification failed");
                json!({ "success": false, "message": FAILURE_MESSAGE })
            }
        }
    }
}

#[async_trait]
impl Tool for LeadNotificationTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_owned(),
            description: "Pass a visitor's question to the human team by email when you cannot \
                          answer it. Collect an email address or phone number first."
                .to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "email": { "type": "string", "description": "Visitor email address" },
                    "phone": { "type": "string", "description": "Visitor phone number" },
                    "question": { "type": "string", "description": "The question to forward" }
                },
                "required": ["question"]
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Value {
        match serde_json::from_str::<LeadNotification>(arguments) {
            Ok(lead) => self.notify(&lead).await,
            Err(e) => {
                warn!(error = %e, "invalid lead notification arguments");
                json!({ "success": false, "message": FAILURE_MESSAGE })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use tracing_test::traced_test;

    use super::*;
    use crate::mail::{MailError, ResendMailer};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }

    fn args() -> String {
        json!({ "email": "ada@example.com", "question": "Do you work with hospitals?" }).to_string()
    }

    #[tokio::test]
    async fn success_when_mailer_accepts() {
        let mailer = Arc::new(RecordingMailer::default());
        let tool = LeadNotificationTool::new(mailer.clone(), "leads@example.com");

        let result = tool.call(&args()).await;
        assert_eq!(result["success"], true);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "leads@example.com");
        assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.com"));
        assert!(sent[0].text.contains("Do you work with hospitals?"));
    }

    #[tokio::test]
    #[traced_test]
    async fn failure_when_mail_key_absent() {
        let tool = LeadNotificationTool::new(
            Arc::new(ResendMailer::new(None, "concierge@example.com")),
            "leads@example.com",
        );
        let result = tool.call(&args()).await;
        assert_eq!(result["success"], false);
        assert_eq!(result["message"], FAILURE_MESSAGE);
        assert!(logs_contain("lead notification failed"));
    }

    #[tokio::test]
    async fn malformed_arguments_do_not_escape() {
        let tool = LeadNotificationTool::new(Arc::new(RecordingMailer::default()), "x@example.com");
        let result = tool.call("{\"email\": 5}").await;
        assert_eq!(result["success"], false);
    }

    #[test]
    fn missing_contact_is_noted() {
        let lead = LeadNotification { email: None, phone: Some(" ".into()), question: "q".into() };
        let text = lead.render();
        assert!(text.contains("Email: not provided"));
        assert!(text.contains("No contact details were given."));
    }
}
