// Notification delivery: a desktop balloon on Windows and optional chat
// webhooks (WeCom, DingTalk, Telegram).

use crate::config::NotificationConfig;
use crate::model::Announcement;
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;

pub const APP_NAME: &str = "通知监控";
pub const MONITOR_TITLE: &str = "青岛人社局通知监控";

const DISPLAY_SECS: u64 = 10;
const MAX_BODY_CHARS: usize = 100;

/// What the monitor needs from a notifier. Kept small so tests can record
/// calls instead of popping up windows.
pub trait Notify {
    /// Show a desktop notification. Returns whether it was delivered.
    fn send_desktop(&self, title: &str, message: &str) -> bool;
    /// Announce newly found announcements on every enabled channel.
    fn notify_new(&self, announcements: &[Announcement]) -> bool;
}

pub struct Notifier {
    config: NotificationConfig,
    http: Client,
}

impl Notifier {
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build webhook client")?;
        Ok(Notifier {
            config: config.clone(),
            http,
        })
    }

    fn post_json(&self, url: &str, body: serde_json::Value) -> Result<()> {
        let res = self
            .http
            .post(url)
            .json(&body)
            .send()
            .context("Failed to send webhook request")?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            bail!("webhook returned {} - {}", status, txt);
        }
        Ok(())
    }

    /// Post to each enabled webhook; returns how many succeeded.
    fn send_webhooks(&self, title: &str, message: &str) -> usize {
        let mut sent = 0;
        let text = format!("{title}\n{message}");

        if self.config.wechat_enabled {
            let body = json!({ "msgtype": "markdown", "markdown": { "content": text } });
            match self.post_json(&self.config.wechat_webhook, body) {
                Ok(()) => sent += 1,
                Err(e) => log::error!("WeCom notification failed: {e:#}"),
            }
        }
        if self.config.dingtalk_enabled {
            let body = json!({ "msgtype": "text", "text": { "content": text } });
            match self.post_json(&self.config.dingtalk_webhook, body) {
                Ok(()) => sent += 1,
                Err(e) => log::error!("DingTalk notification failed: {e:#}"),
            }
        }
        if self.config.telegram_enabled {
            let url = format!(
                "{}/bot{}/sendMessage",
                self.config.telegram_api_base.trim_end_matches('/'),
                self.config.telegram_bot_token
            );
            let body = json!({ "chat_id": self.config.telegram_chat_id, "text": text });
            match self.post_json(&url, body) {
                Ok(()) => sent += 1,
                Err(e) => log::error!("Telegram notification failed: {e:#}"),
            }
        }
        sent
    }
}

impl Notify for Notifier {
    fn send_desktop(&self, title: &str, message: &str) -> bool {
        if !self.config.desktop_enabled {
            return false;
        }
        if !cfg!(windows) {
            log::warn!("desktop notifications are only supported on Windows");
            return false;
        }
        match show_balloon(title, message) {
            Ok(()) => {
                log::info!("desktop notification sent");
                true
            }
            Err(e) => {
                log::error!("desktop notification failed: {e:#}");
                false
            }
        }
    }

    fn notify_new(&self, announcements: &[Announcement]) -> bool {
        if announcements.is_empty() {
            return false;
        }
        let (title, message) = summary(announcements);

        let desktop = self.send_desktop(&title, &message);

        log::info!("new announcement details:");
        for (i, ann) in announcements.iter().enumerate() {
            log::info!("  {}. {}", i + 1, ann.title);
            log::info!("     {}", ann.url);
        }

        let webhook_message = announcements
            .iter()
            .map(|a| format!("{}\n{}", a.title, a.url))
            .collect::<Vec<_>>()
            .join("\n");
        let webhooks = self.send_webhooks(&title, &webhook_message);

        desktop || webhooks > 0
    }
}

/// Title and body of the desktop notification for `announcements`.
pub fn summary(announcements: &[Announcement]) -> (String, String) {
    let n = announcements.len();
    let title = format!("青岛人社局新通知 ({n}条)");
    let message = match announcements {
        [only] => only.title.chars().take(MAX_BODY_CHARS).collect(),
        _ => format!("发现{n}条新通知，请查看日志获取详情"),
    };
    (title, message)
}

/// Show a tray balloon through PowerShell and Windows Forms.
fn show_balloon(title: &str, message: &str) -> Result<()> {
    let script = format!(
        "Add-Type -AssemblyName System.Windows.Forms; \
         $n = New-Object System.Windows.Forms.NotifyIcon; \
         $n.Icon = [System.Drawing.SystemIcons]::Information; \
         $n.Text = '{app}'; \
         $n.BalloonTipTitle = '{title}'; \
         $n.BalloonTipText = '{message}'; \
         $n.Visible = $true; \
         $n.ShowBalloonTip({ms}); \
         Start-Sleep -Seconds {secs}; \
         $n.Dispose()",
        app = ps_quote(APP_NAME),
        title = ps_quote(title),
        message = ps_quote(message),
        ms = DISPLAY_SECS * 1000,
        secs = DISPLAY_SECS,
    );
    // The balloon stays up for a while; don't block the caller on it.
    std::process::Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-WindowStyle", "Hidden", "-Command", &script])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .context("Failed to start powershell")?;
    Ok(())
}

/// Escape for a single-quoted PowerShell string.
fn ps_quote(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use serde_json::Value;

    fn ann(title: &str) -> Announcement {
        Announcement::new(title.into(), "https://x/1".into(), "t".into())
    }

    #[test]
    fn single_announcement_uses_its_title() {
        let (title, message) = summary(&[ann("关于评审的通知")]);
        assert_eq!(title, "青岛人社局新通知 (1条)");
        assert_eq!(message, "关于评审的通知");
    }

    #[test]
    fn long_title_is_truncated_by_chars() {
        let long = "通".repeat(150);
        let (_, message) = summary(&[ann(&long)]);
        assert_eq!(message.chars().count(), 100);
    }

    #[test]
    fn several_announcements_are_summarised() {
        let (title, message) = summary(&[ann("a"), ann("b"), ann("c")]);
        assert_eq!(title, "青岛人社局新通知 (3条)");
        assert_eq!(message, "发现3条新通知，请查看日志获取详情");
    }

    #[test]
    fn disabled_desktop_is_not_delivered() {
        let config = NotificationConfig {
            desktop_enabled: false,
            ..NotificationConfig::default()
        };
        let notifier = Notifier::new(&config).unwrap();
        assert!(!notifier.send_desktop("t", "m"));
        assert!(!notifier.notify_new(&[]));
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(ps_quote("it's"), "it''s");
    }

    fn quiet() -> NotificationConfig {
        NotificationConfig {
            desktop_enabled: false,
            ..NotificationConfig::default()
        }
    }

    #[test]
    fn webhooks_carry_the_expected_payloads() {
        let (wecom, wecom_hits) = serve(vec![(200, "{}")]);
        let (ding, ding_hits) = serve(vec![(200, "{}")]);
        let (tg, tg_hits) = serve(vec![(200, "{}")]);
        let config = NotificationConfig {
            wechat_enabled: true,
            wechat_webhook: format!("{wecom}/wecom"),
            dingtalk_enabled: true,
            dingtalk_webhook: format!("{ding}/ding"),
            telegram_enabled: true,
            telegram_bot_token: "123:abc".into(),
            telegram_chat_id: "42".into(),
            telegram_api_base: format!("{tg}/"),
            ..quiet()
        };

        let notifier = Notifier::new(&config).unwrap();
        assert!(notifier.notify_new(&[ann("关于评审的通知")]));

        let wecom = &wecom_hits.join().unwrap()[0];
        let body: Value = serde_json::from_str(&wecom.body).unwrap();
        assert_eq!(wecom.path, "/wecom");
        assert_eq!(body["msgtype"], "markdown");
        let content = body["markdown"]["content"].as_str().unwrap();
        assert!(content.starts_with("青岛人社局新通知 (1条)\n"));
        assert!(content.contains("关于评审的通知\nhttps://x/1"));

        let ding = &ding_hits.join().unwrap()[0];
        let body: Value = serde_json::from_str(&ding.body).unwrap();
        assert_eq!(body["msgtype"], "text");
        assert!(body["text"]["content"].as_str().unwrap().contains("关于评审的通知"));

        let tg = &tg_hits.join().unwrap()[0];
        let body: Value = serde_json::from_str(&tg.body).unwrap();
        assert_eq!(tg.path, "/bot123:abc/sendMessage");
        assert_eq!(body["chat_id"], "42");
        assert!(body["text"].as_str().unwrap().contains("https://x/1"));
    }

    #[test]
    fn one_working_channel_is_enough() {
        let (wecom, wecom_hits) = serve(vec![(500, "down")]);
        let (ding, ding_hits) = serve(vec![(200, "{}")]);
        let config = NotificationConfig {
            wechat_enabled: true,
            wechat_webhook: wecom,
            dingtalk_enabled: true,
            dingtalk_webhook: ding,
            ..quiet()
        };

        let notifier = Notifier::new(&config).unwrap();
        assert!(notifier.notify_new(&[ann("a"), ann("b")]));
        assert_eq!(wecom_hits.join().unwrap().len(), 1);
        assert_eq!(ding_hits.join().unwrap().len(), 1);
    }

    #[test]
    fn all_channels_failing_reports_nothing_sent() {
        let (wecom, wecom_hits) = serve(vec![(500, "down")]);
        let (ding, ding_hits) = serve(vec![(403, "denied")]);
        let config = NotificationConfig {
            wechat_enabled: true,
            wechat_webhook: wecom,
            dingtalk_enabled: true,
            dingtalk_webhook: ding,
            ..quiet()
        };

        let notifier = Notifier::new(&config).unwrap();
        assert!(!notifier.notify_new(&[ann("a")]));
        wecom_hits.join().unwrap();
        ding_hits.join().unwrap();
    }
}
