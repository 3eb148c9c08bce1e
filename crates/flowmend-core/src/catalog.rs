//! Node type catalogue.
//!
//! One table row per known `type` string: display label, latest `typeVersion`,
//! whether the type starts a pipeline, whether it needs a `webhookId`, and the
//! parameters a freshly generated node of that type should carry. Types that
//! are not in the table are still legal; they just get generic defaults.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::{Value, json};

use crate::Bag;

/// Package prefix of the built-in node types.
pub const BASE_PACKAGE: &str = "n8n-nodes-base";

/// Label for node types the catalogue does not know.
pub const GENERIC_LABEL: &str = "Node";

/// Type assigned to nodes that arrive without one.
pub const GENERIC_TYPE: &str = "n8n-nodes-base.noOp";

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub label: String,
    pub latest_version: u32,
    pub is_trigger: bool,
    pub needs_webhook: bool,
    pub default_parameters: Bag,
    /// Credential a user has to configure before the node can run.
    pub credential: Option<String>,
}

impl NodeSpec {
    pub fn action(label: impl Into<String>, latest_version: u32, defaults: Value) -> Self {
        Self {
            label: label.into(),
            latest_version,
            is_trigger: false,
            needs_webhook: false,
            default_parameters: into_bag(defaults),
            credential: None,
        }
    }

    pub fn trigger(label: impl Into<String>, latest_version: u32, defaults: Value) -> Self {
        Self {
            is_trigger: true,
            ..Self::action(label, latest_version, defaults)
        }
    }

    /// Mark the type as externally addressable (gets a `webhookId`).
    pub fn with_webhook(mut self) -> Self {
        self.needs_webhook = true;
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

fn into_bag(value: Value) -> Bag {
    match value {
        Value::Object(map) => map,
        _ => Bag::new(),
    }
}

/// Immutable lookup table from node type to [`NodeSpec`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    specs: HashMap<String, NodeSpec>,
}

static BUILTIN: LazyLock<Catalog> = LazyLock::new(Catalog::builtin);

impl Catalog {
    /// An empty catalogue: every type is unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The process-wide built-in catalogue.
    pub fn shared() -> &'static Catalog {
        &BUILTIN
    }

    /// Add or replace an entry, returning the extended catalogue.
    pub fn with(mut self, node_type: impl Into<String>, spec: NodeSpec) -> Self {
        self.specs.insert(node_type.into(), spec);
        self
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeSpec> {
        self.specs.get(node_type)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve a type string to the form the catalogue knows.
    ///
    /// Exact matches win. A bare name such as `webhook` resolves to
    /// `n8n-nodes-base.webhook` when that entry exists. Anything else is
    /// returned unchanged.
    pub fn canonical_type(&self, node_type: &str) -> String {
        if self.specs.contains_key(node_type) || node_type.contains('.') {
            return node_type.to_string();
        }
        let prefixed = format!("{}.{}", BASE_PACKAGE, node_type);
        if self.specs.contains_key(&prefixed) {
            prefixed
        } else {
            node_type.to_string()
        }
    }

    pub fn label(&self, node_type: &str) -> &str {
        self.get(node_type)
            .map(|s| s.label.as_str())
            .unwrap_or(GENERIC_LABEL)
    }

    pub fn latest_version(&self, node_type: &str) -> u32 {
        self.get(node_type).map(|s| s.latest_version).unwrap_or(1)
    }

    /// Unknown types never count as triggers.
    pub fn is_trigger(&self, node_type: &str) -> bool {
        self.get(node_type).is_some_and(|s| s.is_trigger)
    }

    pub fn needs_webhook(&self, node_type: &str) -> bool {
        self.get(node_type).is_some_and(|s| s.needs_webhook)
    }

    pub fn default_parameters(&self, node_type: &str) -> Option<&Bag> {
        self.get(node_type).map(|s| &s.default_parameters)
    }

    pub fn credential(&self, node_type: &str) -> Option<&str> {
        self.get(node_type).and_then(|s| s.credential.as_deref())
    }

    pub fn builtin() -> Self {
        let base = |name: &str| format!("{}.{}", BASE_PACKAGE, name);
        Self::empty()
            // Triggers
            .with(
                base("webhook"),
                NodeSpec::trigger(
                    "Webhook",
                    2,
                    json!({
                        "httpMethod": "POST",
                        "path": "webhook",
                        "responseMode": "onReceived",
                        "options": {}
                    }),
                )
                .with_webhook(),
            )
            .with(
                base("formTrigger"),
                NodeSpec::trigger(
                    "Form Trigger",
                    2,
                    json!({
                        "formTitle": "Form",
                        "formFields": {"values": []},
                        "options": {}
                    }),
                )
                .with_webhook(),
            )
            .with(
                base("manualTrigger"),
                NodeSpec::trigger("Manual Trigger", 1, json!({})),
            )
            .with(
                base("scheduleTrigger"),
                NodeSpec::trigger(
                    "Schedule Trigger",
                    1,
                    json!({"rule": {"interval": [{"field": "days"}]}}),
                ),
            )
            .with(
                base("cron"),
                NodeSpec::trigger("Cron", 1, json!({"rule": {"hour": 9, "minute": 0}})),
            )
            .with(
                base("intervalTrigger"),
                NodeSpec::trigger("Interval", 1, json!({"interval": 1, "unit": "hours"})),
            )
            .with(
                base("emailTrigger"),
                NodeSpec::trigger(
                    "Email Trigger (IMAP)",
                    2,
                    json!({"mailbox": "INBOX", "postProcessAction": "read", "options": {}}),
                ),
            )
            .with(
                base("fileTrigger"),
                NodeSpec::trigger(
                    "Local File Trigger",
                    1,
                    json!({
                        "triggerOn": "folder",
                        "path": "={{$env.WATCH_FOLDER}}",
                        "events": ["add"],
                        "options": {}
                    }),
                ),
            )
            // Actions
            .with(
                base("googleSheets"),
                NodeSpec::action(
                    "Google Sheets",
                    4,
                    json!({
                        "resource": "sheet",
                        "operation": "appendOrUpdate",
                        "documentId": {"__rl": true, "value": "={{$env.GOOGLE_SHEET_ID}}", "mode": "id"},
                        "sheetName": {"__rl": true, "value": "Sheet1", "mode": "list"},
                        "columns": {
                            "mappingMode": "autoMapInputData",
                            "value": {},
                            "matchingColumns": [],
                            "schema": []
                        },
                        "options": {}
                    }),
                )
                .with_credential("Google Sheets API"),
            )
            .with(
                base("gmail"),
                NodeSpec::action(
                    "Gmail",
                    2,
                    json!({
                        "operation": "send",
                        "sendTo": "={{ $json.email }}",
                        "subject": "New notification",
                        "message": "={{ $json.message }}",
                        "options": {}
                    }),
                )
                .with_credential("Gmail API"),
            )
            .with(
                base("emailSend"),
                NodeSpec::action(
                    "Send Email",
                    2,
                    json!({
                        "fromEmail": "={{$env.EMAIL_FROM}}",
                        "toEmail": "={{ $json.email }}",
                        "subject": "New notification",
                        "text": "={{ $json.message }}",
                        "options": {}
                    }),
                ),
            )
            .with(
                base("set"),
                NodeSpec::action(
                    "Edit Fields",
                    3,
                    json!({"values": {"string": []}, "options": {}}),
                ),
            )
            .with(
                base("httpRequest"),
                NodeSpec::action(
                    "HTTP Request",
                    4,
                    json!({"method": "GET", "url": "={{$env.API_ENDPOINT}}", "options": {}}),
                )
                .with_credential("HTTP Authentication"),
            )
            .with(
                base("code"),
                NodeSpec::action("Code", 2, json!({"jsCode": "return $input.all();"})),
            )
            .with(
                base("respondToWebhook"),
                NodeSpec::action(
                    "Respond to Webhook",
                    1,
                    json!({
                        "respondWith": "json",
                        "responseBody": "={{ { \"success\": true } }}",
                        "options": {}
                    }),
                ),
            )
            .with(
                base("if"),
                NodeSpec::action(
                    "If",
                    2,
                    json!({"conditions": {"conditions": [], "combinator": "and"}, "options": {}}),
                ),
            )
            .with(
                base("slack"),
                NodeSpec::action(
                    "Slack",
                    2,
                    json!({
                        "resource": "message",
                        "operation": "postMessage",
                        "channel": "={{$env.SLACK_CHANNEL}}",
                        "text": "={{ $json.message }}",
                        "otherOptions": {}
                    }),
                )
                .with_credential("Slack API"),
            )
            .with(
                base("telegram"),
                NodeSpec::action(
                    "Telegram",
                    1,
                    json!({
                        "chatId": "={{$env.TELEGRAM_CHAT_ID}}",
                        "text": "={{ $json.message }}",
                        "additionalFields": {}
                    }),
                ),
            )
            .with(
                base("noOp"),
                NodeSpec::action("No Operation", 1, json!({})),
            )
    }
}
