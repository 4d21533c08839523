// Email bodies for each notification the service sends

use crate::domain::incident::Incident;
use crate::domain::user::User;
use crate::notify::mailer::{EmailMessage, Mailbox};

/// Escape text interpolated into HTML bodies
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn otp_code(to: &str, code: &str, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to: vec![Mailbox::new(to)],
        reply_to: None,
        subject: "Your password reset code".to_string(),
        html_body: format!(
            "<div>\
               <h2>Hello,</h2>\
               <p>Here is your code to reset your password:</p>\
               <h3>{code}</h3>\
               <p>This code is valid for {ttl_minutes} minutes.</p>\
               <p>If you did not request it, you can ignore this email.</p>\
             </div>",
            code = escape_html(code),
        ),
    }
}

pub fn incident_alert(recipients: &[String], incident: &Incident, reporter: &User) -> EmailMessage {
    let optional = |value: &Option<String>| escape_html(value.as_deref().unwrap_or("-"));

    EmailMessage {
        to: recipients.iter().map(Mailbox::new).collect(),
        reply_to: Some(Mailbox::named(&reporter.email, &reporter.name)),
        subject: format!("New incident reported: {}", incident.title),
        html_body: format!(
            "<div style=\"font-family: Arial, sans-serif;\">\
               <h2>A new incident has been reported</h2>\
               <p><strong>Incident</strong></p>\
               <ul>\
                 <li><strong>Title:</strong> {title}</li>\
                 <li><strong>Description:</strong> {description}</li>\
                 <li><strong>Priority:</strong> {priority}</li>\
                 <li><strong>Category:</strong> {category}</li>\
                 <li><strong>Date:</strong> {date}</li>\
               </ul>\
               <p><strong>Reported by</strong></p>\
               <ul>\
                 <li><strong>Name:</strong> {name}</li>\
                 <li><strong>Email:</strong> {email}</li>\
                 <li><strong>Company:</strong> {company}</li>\
                 <li><strong>Phone:</strong> {phone}</li>\
               </ul>\
             </div>",
            title = escape_html(&incident.title),
            description = escape_html(&incident.description),
            priority = incident.priority,
            category = incident.category,
            date = incident.created_at.format("%Y-%m-%d %H:%M:%S"),
            name = escape_html(&reporter.name),
            email = escape_html(&reporter.email),
            company = optional(&reporter.company),
            phone = optional(&reporter.phone),
        ),
    }
}

pub fn incident_resolved(owner_email: &str, owner_name: &str, incident_title: &str) -> EmailMessage {
    EmailMessage {
        to: vec![Mailbox::named(owner_email, owner_name)],
        reply_to: None,
        subject: "Your incident has been resolved".to_string(),
        html_body: format!(
            "<div>\
               <h2>Hello {name},</h2>\
               <p>Your incident <strong>{title}</strong> has been marked as \
                  <strong>resolved</strong> by our team.</p>\
               <p>Please check that the problem is gone. If it persists, contact us again.</p>\
               <p>The Support Team</p>\
             </div>",
            name = escape_html(owner_name),
            title = escape_html(incident_title),
        ),
    }
}

pub fn contact_message(
    recipient: &str,
    name: &str,
    email: &str,
    subject: &str,
    message: &str,
) -> EmailMessage {
    EmailMessage {
        to: vec![Mailbox::new(recipient)],
        reply_to: Some(Mailbox::named(email, name)),
        subject: format!("Contact message: {}", subject),
        html_body: format!(
            "<div>\
               <h2>New contact message</h2>\
               <p><strong>Name:</strong> {name}</p>\
               <p><strong>Email:</strong> {email}</p>\
               <p><strong>Subject:</strong> {subject}</p>\
               <p><strong>Message:</strong></p>\
               <p>{message}</p>\
             </div>",
            name = escape_html(name),
            email = escape_html(email),
            subject = escape_html(subject),
            message = escape_html(message),
        ),
    }
}
