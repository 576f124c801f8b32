// src/services/email.rs
//! Delivery of single-use links (verification, password reset, magic link)

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::models::TokenType;
use crate::common::helpers::{safe_email_log, safe_token_log};
use crate::config::{EmailConfig, EmailProvider};

const RESEND_URL: &str = "https://api.resend.com/emails";

/// Outbound channel for single-use tokens. Returns `false` on any failure;
/// no retries.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    async fn send(&self, kind: TokenType, recipient: &str, token: &str, base_url: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Link the recipient follows to redeem `token`. `None` for kinds that are
/// not delivered by email.
pub fn action_url(kind: TokenType, token: &str, base_url: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    let token = urlencoding::encode(token);
    match kind {
        TokenType::EmailVerification => Some(format!("{}/api/auth/verify-email/{}", base, token)),
        TokenType::PasswordReset => Some(format!("{}/api/auth/reset-password/{}", base, token)),
        TokenType::MagicLink => Some(format!("{}/api/auth/magic-link/verify/{}", base, token)),
        TokenType::PhoneVerification | TokenType::TwoFactor => None,
    }
}

fn layout(app_name: &str, heading: &str, color: &str, intro: &str, button: &str, url: &str, footer: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ background-color: {color}; color: white; padding: 20px; text-align: center; }}
        .content {{ padding: 20px; background-color: #f9f9f9; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
        .button {{ display: inline-block; padding: 12px 24px; background-color: {color}; color: white; text-decoration: none; border-radius: 5px; margin: 10px 0; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>{heading}</h1>
        </div>
        <div class="content">
            <p>{intro}</p>

            <p><a class="button" href="{url}">{button}</a></p>

            <p>Or copy this link into your browser:<br>{url}</p>
        </div>
        <div class="footer">
            <p>{footer}</p>
            <p>{app_name}</p>
        </div>
    </div>
</body>
</html>"#
    )
}

pub fn render_message(kind: TokenType, app_name: &str, url: &str) -> Option<EmailMessage> {
    let message = match kind {
        TokenType::EmailVerification => EmailMessage {
            subject: format!("Verify your email for {}", app_name),
            html: layout(
                app_name,
                "Verify your email address",
                "#4F46E5",
                "Thanks for signing up! Please confirm your email address to finish setting up your account.",
                "Verify Email",
                url,
                "This link expires in 24 hours. If you did not create an account, you can ignore this email.",
            ),
            text: format!("Verify your email address for {}: {}", app_name, url),
        },
        TokenType::PasswordReset => EmailMessage {
            subject: format!("Reset your {} password", app_name),
            html: layout(
                app_name,
                "Reset your password",
                "#DC2626",
                "We received a request to reset your password. Use the button below to choose a new one.",
                "Reset Password",
                url,
                "This link expires in 1 hour. If you did not request a reset, your password is unchanged.",
            ),
            text: format!("Reset your {} password: {}", app_name, url),
        },
        TokenType::MagicLink => EmailMessage {
            subject: format!("Sign in to {}", app_name),
            html: layout(
                app_name,
                "Your sign-in link",
                "#10B981",
                "Click the button below to sign in. The link can only be used once.",
                "Sign In",
                url,
                "If you did not request this link, you can ignore this email.",
            ),
            text: format!("Sign in to {}: {}", app_name, url),
        },
        TokenType::PhoneVerification | TokenType::TwoFactor => return None,
    };
    Some(message)
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Sends mail through the Resend HTTP API
#[derive(Debug, Clone)]
pub struct ResendDelivery {
    client: Client,
    api_key: String,
    from: String,
    app_name: String,
}

impl ResendDelivery {
    pub fn new(client: Client, api_key: String, from: String, app_name: String) -> Self {
        Self {
            client,
            api_key,
            from,
            app_name,
        }
    }
}

#[async_trait]
impl DeliveryService for ResendDelivery {
    async fn send(&self, kind: TokenType, recipient: &str, token: &str, base_url: &str) -> bool {
        let Some(message) =
            action_url(kind, token, base_url).and_then(|url| render_message(kind, &self.app_name, &url))
        else {
            warn!(kind = %kind, "No email template for token type");
            return false;
        };

        let request = ResendRequest {
            from: &self.from,
            to: [recipient],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        match self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(
                    kind = %kind,
                    recipient = %safe_email_log(recipient),
                    "Email sent"
                );
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(
                    kind = %kind,
                    recipient = %safe_email_log(recipient),
                    status = %status,
                    error = %body,
                    "Email provider rejected message"
                );
                false
            }
            Err(e) => {
                error!(
                    kind = %kind,
                    recipient = %safe_email_log(recipient),
                    error = %e,
                    "Email request failed"
                );
                false
            }
        }
    }
}

/// Writes the redemption link to the log. For local development.
#[derive(Debug, Clone, Default)]
pub struct LogDelivery;

#[async_trait]
impl DeliveryService for LogDelivery {
    async fn send(&self, kind: TokenType, recipient: &str, token: &str, base_url: &str) -> bool {
        match action_url(kind, token, base_url) {
            Some(url) => {
                info!(
                    kind = %kind,
                    recipient = %safe_email_log(recipient),
                    token = %safe_token_log(token),
                    url = %url,
                    "Delivery (log only)"
                );
                true
            }
            None => false,
        }
    }
}

/// Builds the delivery collaborator for the configured provider.
pub fn delivery_from_config(config: &EmailConfig, client: Client) -> Option<Arc<dyn DeliveryService>> {
    match config.provider {
        EmailProvider::Resend => match &config.api_key {
            Some(api_key) => Some(Arc::new(ResendDelivery::new(
                client,
                api_key.clone(),
                config.from.clone(),
                config.app_name.clone(),
            ))),
            None => {
                warn!("Resend email provider selected without EMAIL_API_KEY; delivery disabled");
                None
            }
        },
        EmailProvider::Log => Some(Arc::new(LogDelivery)),
    }
}
