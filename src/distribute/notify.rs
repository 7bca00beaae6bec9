//! Notification mail for a distributed dataset.

use chrono::NaiveDate;
use url::Url;

use crate::mail::{MailOptions, OutgoingMail};
use crate::types::DistributionConfig;

use super::tables::Recipients;

const FONT: &str = "Tahoma";
const COLOR: &str = "Black";
const SIZE: &str = "13px";

/// `YYYYMMDD` rendered as `dd-mm-YYYY`; anything else is returned as given.
pub fn display_period(period: &str) -> String {
    NaiveDate::parse_from_str(period, "%Y%m%d")
        .map(|d| d.format("%d-%m-%Y").to_string())
        .unwrap_or_else(|_| period.to_string())
}

/// Link to `folder` under `base`, with the folder name percent-encoded.
pub fn folder_link(base: &str, folder: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(folder);
    Some(url.to_string())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// HTML body announcing `file` in `folder` for the given period.
pub fn compose_html(folder: &str, file: &str, period: &str, link_base: Option<&str>) -> String {
    let plain = format!("font-family:{}; color:{}; font-size: {};", FONT, COLOR, SIZE);
    let indented = format!("{} text-indent: 30px", plain);
    let folder_html = match link_base.and_then(|base| folder_link(base, folder)) {
        Some(href) => format!("<a href=\"{}\">{}</a>", escape(&href), escape(folder)),
        None => escape(folder),
    };

    let paragraphs = [
        format!("<p style=\"{}\"><b>Internal Fraud Monitoring Team</b></p>", plain),
        format!(
            "<p style=\"{}\">&emsp; นำส่งไฟล์ Pattern รอบ {} ตามรายละเอียดด้านล่าง</p>",
            indented,
            escape(&display_period(period))
        ),
        format!("<p style=\"{}\">&emsp; Pattern : {}</p>", indented, folder_html),
        format!("<p style=\"{}\">&emsp; File name : {}</p>", indented, escape(file)),
        format!("<p style=\"{}\"><b>Best Regards</b>,</p>", plain),
        format!("<p style=\"{}\">Fraud Analytics</p>", plain),
    ];
    format!("<!DOCTYPE html><html><body>{}</body></html>", paragraphs.concat())
}

/// The outgoing mail for one distributed entry.
pub fn compose_notification(
    settings: &DistributionConfig,
    recipients: &Recipients,
    folder: &str,
    file: &str,
    period: &str,
) -> OutgoingMail {
    OutgoingMail {
        html_body: compose_html(folder, file, period, settings.link_base.as_deref()),
        recipients: recipients.to().to_vec(),
        cc: recipients.cc().to_vec(),
        subject: settings.subject.clone(),
        options: MailOptions {
            display: settings.display,
            importance: settings.importance,
            sensitivity: settings.sensitivity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribute::tables::tests::recipients_sheet;

    #[test]
    fn test_display_period() {
        assert_eq!(display_period("20240131"), "31-01-2024");
        assert_eq!(display_period("UNKNOWN"), "UNKNOWN");
    }

    #[test]
    fn test_folder_link_encodes_name() {
        assert_eq!(
            folder_link("https://share.example.com/fraud/", "Pattern A001").as_deref(),
            Some("https://share.example.com/fraud/Pattern%20A001")
        );
        assert_eq!(
            folder_link("https://share.example.com/fraud", "A/B").as_deref(),
            Some("https://share.example.com/fraud/A%2FB")
        );
        assert_eq!(folder_link("not a url", "A001"), None);
    }

    #[test]
    fn test_html_body() {
        let html = compose_html(
            "Pattern A001",
            "20240131_A001.json",
            "20240131",
            Some("https://share.example.com/fraud/"),
        );
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<b>Internal Fraud Monitoring Team</b>"));
        assert!(html.contains("รอบ 31-01-2024"));
        assert!(html.contains(
            "<a href=\"https://share.example.com/fraud/Pattern%20A001\">Pattern A001</a>"
        ));
        assert!(html.contains("File name : 20240131_A001.json"));
        assert!(html.contains("font-family:Tahoma; color:Black; font-size: 13px;"));
    }

    #[test]
    fn test_html_without_link_base() {
        let html = compose_html("R&D <1>", "f.json", "20240131", None);
        assert!(html.contains("Pattern : R&amp;D &lt;1&gt;</p>"));
        assert!(!html.contains("<a href"));
    }

    #[test]
    fn test_notification_fields() {
        let recipients = Recipients::from_sheet(&recipients_sheet()).unwrap();
        let settings = DistributionConfig::default();
        let mail =
            compose_notification(&settings, &recipients, "Pattern A001", "f.json", "20240131");
        assert_eq!(mail.recipients.len(), 3);
        assert_eq!(mail.cc, vec!["lead@example.com".to_string()]);
        assert_eq!(mail.subject, "Internal Fraud Monitoring Team");
        assert_eq!(mail.options.importance, 2);
        assert_eq!(mail.options.sensitivity, 1);
        assert!(mail.options.display);
    }
}
