//! HTML report rendering for alert and recovery notifications

use crate::anomaly::{AlertEvent, SpikeDetector};
use crate::models::{ProcessInfo, SpikeSnapshot};
use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

const BASE_CSS: &str = "\
table { width: 100%; border-collapse: collapse; }
th, td { padding: 8px; text-align: left; border: 1px solid #ddd; }
th { background-color: #f2f2f2; }
.high-usage { background-color: #f8d7da; color: #721c24; }
";

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
}

/// Renders alert lifecycle events into subject lines and HTML bodies
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    hostname: String,
    detector: SpikeDetector,
}

impl ReportRenderer {
    /// `threshold` decides which utilization rows are highlighted
    pub fn new(hostname: impl Into<String>, threshold: f64) -> Self {
        Self {
            hostname: hostname.into(),
            detector: SpikeDetector::new(threshold),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn render(&self, event: &AlertEvent) -> Notification {
        match event {
            AlertEvent::Alert {
                current,
                opened_at,
                first_in_incident,
                ..
            } => self.render_alert(current, *opened_at, *first_in_incident),
            AlertEvent::Recovery {
                incident,
                opened_at,
                recovered_at,
            } => self.render_recovery(incident, *opened_at, *recovered_at),
        }
    }

    fn render_alert(
        &self,
        current: &SpikeSnapshot,
        opened_at: DateTime<Utc>,
        first_in_incident: bool,
    ) -> Notification {
        let sample = &current.sample;
        // Rendering only ever sees validated samples; fall back to no highlighting
        let breaches = self.detector.breaches(sample).unwrap_or_default();
        let max_cpu = sample.max_cpu().unwrap_or_default();
        let threshold = self.detector.threshold;

        let mut html = String::with_capacity(4096);
        open_document(&mut html);
        html.push_str("<h2>System Resource Utilization Alert</h2>\n");
        html.push_str(&format!(
            "<p>The following system resources are above {:.0}% utilization on {}:</p>\n",
            threshold,
            escape_html(&self.hostname)
        ));
        if !first_in_incident {
            html.push_str(&format!(
                "<p>Utilization has remained high since {}.</p>\n",
                opened_at.format(TIMESTAMP_FORMAT)
            ));
        }
        html.push_str(&format!(
            "<p>Sampled at: {}</p>\n",
            sample.timestamp.format(TIMESTAMP_FORMAT)
        ));

        html.push_str("<table>\n<tr><th>Resource</th><th>Usage</th></tr>\n");
        for (label, value, high) in [
            ("CPU Usage", max_cpu, breaches.cpu),
            ("Memory Usage", sample.memory_percent, breaches.memory),
            ("Disk Usage", sample.disk_percent, breaches.disk),
            ("Swap Usage", sample.swap_percent, breaches.swap),
        ] {
            html.push_str(&format!(
                "<tr class=\"{}\"><td>{}</td><td>{:.1}%</td></tr>\n",
                if high { "high-usage" } else { "" },
                label,
                value
            ));
        }
        html.push_str("</table>\n");

        push_process_table(
            &mut html,
            "Top Processes by CPU Usage",
            &current.processes.top_by_cpu,
            Metric::Cpu,
        );
        push_process_table(
            &mut html,
            "Top Processes by Memory Usage",
            &current.processes.top_by_memory,
            Metric::Memory,
        );

        html.push_str("<h3>Disk Usage</h3>\n");
        html.push_str(&format!("<pre>{}</pre>\n", sample.disk_usage.summary()));
        close_document(&mut html);

        Notification {
            subject: format!(
                "{} Server Resource Utilization Alert",
                self.hostname
            ),
            html_body: html,
        }
    }

    fn render_recovery(
        &self,
        incident: &SpikeSnapshot,
        opened_at: DateTime<Utc>,
        recovered_at: DateTime<Utc>,
    ) -> Notification {
        let mut html = String::with_capacity(4096);
        open_document(&mut html);
        html.push_str("<h2>Resource Utilization Back to Normal</h2>\n");
        html.push_str(&format!(
            "<p>Resource utilization on {} is back to normal.</p>\n",
            escape_html(&self.hostname)
        ));
        html.push_str("<p>Details of the previous spike:</p>\n");
        html.push_str(&format!(
            "<p>Spike detected at: {}</p>\n",
            opened_at.format(TIMESTAMP_FORMAT)
        ));
        html.push_str(&format!(
            "<p>Recovered at: {}</p>\n",
            recovered_at.format(TIMESTAMP_FORMAT)
        ));

        push_process_table(
            &mut html,
            "Top Processes by CPU Usage During Spike",
            &incident.processes.top_by_cpu,
            Metric::Cpu,
        );
        push_process_table(
            &mut html,
            "Top Processes by Memory Usage During Spike",
            &incident.processes.top_by_memory,
            Metric::Memory,
        );
        close_document(&mut html);

        Notification {
            subject: format!(
                "{} Server Resource Utilization Coming Back to Normal",
                self.hostname
            ),
            html_body: html,
        }
    }
}

#[derive(Clone, Copy)]
enum Metric {
    Cpu,
    Memory,
}

fn open_document(html: &mut String) {
    html.push_str("<html>\n<head>\n<style>\n");
    html.push_str(BASE_CSS);
    html.push_str("</style>\n</head>\n<body>\n");
}

fn close_document(html: &mut String) {
    html.push_str("</body>\n</html>\n");
}

fn push_process_table(html: &mut String, title: &str, processes: &[ProcessInfo], metric: Metric) {
    let header = match metric {
        Metric::Cpu => "CPU Usage",
        Metric::Memory => "Memory Usage",
    };

    html.push_str(&format!("<h3>{}</h3>\n", title));
    html.push_str(&format!(
        "<table>\n<tr><th>PID</th><th>Name</th><th>User</th><th>{}</th></tr>\n",
        header
    ));
    for process in processes {
        let value = match metric {
            Metric::Cpu => process.cpu_percent,
            Metric::Memory => process.memory_percent,
        };
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}%</td></tr>\n",
            process.pid,
            escape_html(&process.name),
            escape_html(&process.user),
            value
        ));
    }
    html.push_str("</table>\n");
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
