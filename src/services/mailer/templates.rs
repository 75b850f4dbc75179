use crate::services::mailer::{EmailMessage, MailError, MailResult};
use ammonia::clean_text;

pub struct InviteMailContext {
    pub code: String,
    pub url: String,
    pub expires_at: String,
}

pub struct CreatedMailContext {
    pub code: String,
    pub username: String,
    pub address: String,
    pub created_at: String,
}

pub struct ExpiryMailContext {
    pub code: String,
    pub expired_at: String,
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; background: #f5f5f5; }}
        .card {{ max-width: 560px; margin: 40px auto; background: white; border-radius: 8px; padding: 32px; }}
        .code {{ font-family: 'SF Mono', Monaco, monospace; color: #2563eb; }}
        .footer {{ margin-top: 24px; color: #888; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="card">
        <h1>{}</h1>
        {}
    </div>
</body>
</html>"#,
        clean_text(title),
        body
    )
}

fn require(field: &str, value: &str) -> MailResult<()> {
    if value.trim().is_empty() {
        return Err(MailError::Construct(format!("missing {field}")));
    }
    Ok(())
}

pub fn invite(ctx: &InviteMailContext) -> MailResult<EmailMessage> {
    require("invite code", &ctx.code)?;
    require("invite url", &ctx.url)?;
    let text = format!(
        "You've been invited to create an account.\n\n\
         Open the link below to sign up:\n{}\n\n\
         The invite expires on {}.",
        ctx.url, ctx.expires_at
    );
    let html = html_page(
        "You've been invited",
        &format!(
            r#"<p>Open the link below to create your account.</p>
        <p><a href="{url}">{url}</a></p>
        <p class="footer">This invite expires on {expires}.</p>"#,
            url = clean_text(&ctx.url),
            expires = clean_text(&ctx.expires_at)
        ),
    );
    Ok(EmailMessage {
        subject: "Invite".to_string(),
        text,
        html,
    })
}

pub fn created(ctx: &CreatedMailContext) -> MailResult<EmailMessage> {
    require("invite code", &ctx.code)?;
    require("username", &ctx.username)?;
    let address = if ctx.address.is_empty() {
        "n/a"
    } else {
        ctx.address.as_str()
    };
    let text = format!(
        "A user was created using invite {}.\n\n\
         Name: {}\nAddress: {}\nTime: {}",
        ctx.code, ctx.username, address, ctx.created_at
    );
    let html = html_page(
        "User created",
        &format!(
            r#"<p>A user was created using invite <span class="code">{}</span>.</p>
        <p>Name: {}<br>Address: {}<br>Time: {}</p>"#,
            clean_text(&ctx.code),
            clean_text(&ctx.username),
            clean_text(address),
            clean_text(&ctx.created_at)
        ),
    );
    Ok(EmailMessage {
        subject: format!("Notice: User created with invite {}", ctx.code),
        text,
        html,
    })
}

pub fn expiry(ctx: &ExpiryMailContext) -> MailResult<EmailMessage> {
    require("invite code", &ctx.code)?;
    let text = format!("Invite {} expired at {}.", ctx.code, ctx.expired_at);
    let html = html_page(
        "Invite expired",
        &format!(
            r#"<p>Invite <span class="code">{}</span> expired at {}.</p>"#,
            clean_text(&ctx.code),
            clean_text(&ctx.expired_at)
        ),
    );
    Ok(EmailMessage {
        subject: format!("Notice: Invite {} expired", ctx.code),
        text,
        html,
    })
}

pub fn deleted(reason: &str) -> MailResult<EmailMessage> {
    let reason = if reason.trim().is_empty() {
        "No reason was given."
    } else {
        reason
    };
    let text = format!("Your account has been deleted.\n\nReason: {reason}");
    let html = html_page(
        "Your account was deleted",
        &format!("<p>Reason: {}</p>", clean_text(reason)),
    );
    Ok(EmailMessage {
        subject: "Your account was deleted".to_string(),
        text,
        html,
    })
}
