/// Label taxonomies and prompt text for each log source
use crate::log_record::SourceKind;

/// Anomaly category for normal or unclassified lines
pub const OTHER_CATEGORY: &str = "Other";

/// Anomaly categories, shared by every source kind
pub const EVENT_CATEGORIES: [&str; 4] = [
    "Authentication & Security Failures",
    "Hardware & Kernel Config Errors",
    "Service Communication & Timeout Exceptions",
    OTHER_CATEGORY,
];

const LINUX_SEMANTIC_CLASSES: [(&str, &str); 7] = [
    (
        "Authentication & Security",
        "user logins (SSH/FTP), permission checks, PAM modules, SELinux audit events",
    ),
    (
        "Hardware & Device Drivers",
        "detection and driver loading for CPU, PCI bus, USB devices, disks and other peripherals",
    ),
    (
        "Memory Management",
        "physical memory allocation, virtual memory mapping, cache statistics, memory zones",
    ),
    (
        "Network & Connectivity",
        "interface state, protocol stack initialisation, address assignment, low-level network traffic",
    ),
    (
        "System Services & Daemons",
        "start, stop and status reports of background services such as crond, cupsd, syslogd, sshd",
    ),
    (
        "Power Management",
        "ACPI, APM and BIOS power management table parsing and interaction",
    ),
    (
        "Kernel Boot & General System",
        "kernel version, boot command line, filesystem quotas (VFS), general lifecycle events",
    ),
];

const ANDROID_SEMANTIC_CLASSES: [(&str, &str); 7] = [
    (
        "Activity & Window Management",
        "activity starts, window focus and visibility, surface and display layout changes",
    ),
    (
        "Application Lifecycle",
        "process start and death, package installs, broadcasts, service binding",
    ),
    (
        "Power & Battery Management",
        "wakelocks, screen on/off, doze, battery level and charging state",
    ),
    (
        "Network & Connectivity",
        "Wi-Fi, mobile data, Bluetooth, DNS and socket activity",
    ),
    (
        "Sensors & Hardware",
        "sensor events, camera, audio, touch input and other device HAL traffic",
    ),
    (
        "Permissions & Security",
        "permission checks and grants, SELinux denials, keystore and authentication",
    ),
    (
        "System Framework & General",
        "system_server internals, binder transactions, configuration and general status",
    ),
];

/// Closed label sets used for one source kind
#[derive(Debug, Clone, Copy)]
pub struct Taxonomy {
    pub source: SourceKind,
    semantic: &'static [(&'static str, &'static str)],
}

impl Taxonomy {
    pub fn for_source(source: SourceKind) -> Self {
        let semantic: &'static [(&'static str, &'static str)] = match source {
            SourceKind::Linux => &LINUX_SEMANTIC_CLASSES,
            SourceKind::Android => &ANDROID_SEMANTIC_CLASSES,
        };
        Self { source, semantic }
    }

    pub fn semantic_classes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.semantic.iter().map(|(name, _)| *name)
    }

    /// Label used when semantic classification yields nothing usable
    pub fn default_semantic_class(&self) -> &'static str {
        match self.source {
            SourceKind::Linux => "Kernel Boot & General System",
            SourceKind::Android => "System Framework & General",
        }
    }

    /// Label used when anomaly classification yields nothing usable
    pub fn default_event_category(&self) -> &'static str {
        OTHER_CATEGORY
    }

    /// Canonical spelling of a semantic label, matched ignoring case and
    /// surrounding whitespace
    pub fn canonical_semantic(&self, label: &str) -> Option<&'static str> {
        canonical(self.semantic_classes(), label)
    }

    pub fn canonical_event(&self, label: &str) -> Option<&'static str> {
        canonical(EVENT_CATEGORIES.iter().copied(), label)
    }

    pub fn semantic_prompt(&self, masked_content: &str) -> String {
        let classes = self
            .semantic
            .iter()
            .map(|(name, description)| format!("{}: {}", name, description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are an expert in {source} operating system logs. Analyse the meaning of the following log line and choose the most suitable category:
"{content}"

Categories:
{classes}

Respond with ONLY a JSON object such as {{"SemanticClass": "category name"}}
Do not include any explanation or Markdown."#,
            source = self.source,
            content = masked_content,
            classes = classes
        )
    }

    pub fn event_prompt(&self, masked_content: &str) -> String {
        format!(
            r#"You are an expert in {source} operating system logs who reasons carefully. Decide whether the following log line is anomalous, give a reason, and pick the most suitable category:
"{content}"

Rules:
- A user failing authentication, lacking permission, or an illegal access attempt: "Authentication & Security Failures"
- Outdated hardware, BIOS misconfiguration, invalid resource tables, or a kernel subsystem failing to initialise: "Hardware & Kernel Config Errors"
- A service unreachable at runtime, a connection dropped abnormally, or a response timing out: "Service Communication & Timeout Exceptions"
- A normal line, or anything not covered above, MUST be "Other"

Respond with ONLY a JSON object such as {{"Normal": "True or False", "Reason": "why", "EventCategory": "category name"}}
Do not include any explanation or Markdown."#,
            source = self.source,
            content = masked_content
        )
    }

    /// Free-text root-cause prompt for one flagged line
    pub fn root_cause_prompt(&self, content: &str, category: &str) -> String {
        format!(
            r#"This {source} system log line was classified as "{category}":
"{content}"

Briefly analyse:
1. The most likely root cause
2. Recommended troubleshooting or remediation steps
Answer as a plain-text list, without Markdown code blocks."#,
            source = self.source,
            category = category,
            content = content
        )
    }
}

fn canonical<'a>(mut labels: impl Iterator<Item = &'a str>, label: &str) -> Option<&'a str> {
    let wanted = label.trim();
    labels.find(|candidate| candidate.eq_ignore_ascii_case(wanted))
}
