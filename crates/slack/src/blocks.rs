use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

/// Single-choice menu. Slack caps a menu at 100 options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaticSelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_option: Option<SelectOption>,
}

impl StaticSelectElement {
    pub fn new(action_id: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            options: Vec::new(),
            initial_option: None,
        }
    }

    pub fn option(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(SelectOption::new(label, value));
        self
    }

    /// Preselects the option carrying `value`, if present.
    pub fn initial(mut self, value: Option<&str>) -> Self {
        self.initial_option =
            value.and_then(|value| self.options.iter().find(|option| option.value == value).cloned());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonElement),
    StaticSelect(StaticSelectElement),
}

impl ActionElement {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(button) => &button.action_id,
            Self::StaticSelect(select) => &select.action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Divider { block_id: String },
    Actions { block_id: String, elements: Vec<ActionElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Every action id in the message, in block order.
    pub fn action_ids(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Actions { elements, .. } => Some(elements),
                _ => None,
            })
            .flatten()
            .map(ActionElement::action_id)
            .collect()
    }

    /// Body fields shared by `chat.postMessage`, `chat.update` and response URLs.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({ "text": self.fallback_text, "blocks": self.blocks })
    }

    /// Concatenated text of every section and context block.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for block in &self.blocks {
            match block {
                Block::Section { text: object, .. } => {
                    text.push_str(object.text());
                    text.push('\n');
                }
                Block::Context { elements, .. } => {
                    for element in elements {
                        text.push_str(element.text());
                        text.push('\n');
                    }
                }
                Block::Divider { .. } | Block::Actions { .. } => {}
            }
        }
        text
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    /// Adds an actions block. Empty action sets are skipped since Slack rejects them.
    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        let elements = builder.build();
        if !elements.is_empty() {
            self.blocks.push(Block::Actions { block_id: block_id.into(), elements });
        }
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(ActionElement::Button(button));
        self
    }

    pub fn select(&mut self, select: StaticSelectElement) -> &mut Self {
        self.elements.push(ActionElement::StaticSelect(select));
        self
    }

    fn build(self) -> Vec<ActionElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub fn notice_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text.to_owned())
        .section("raid.notice.v1", |section| {
            section.mrkdwn(text.to_owned());
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("raid.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("raid.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Raid command help")
        .section("raid.help.raid.v1", |section| {
            section.mrkdwn(
                "*Raid commands*\n• `/raid create <name> <tanks> <healers> <dps>` (admin)\n• `/raid signup <character>`\n• `/raid close` (admin)\n• `/raid limits <tanks> <healers> <dps>` (admin)\n• `/raid help`",
            );
        })
        .section("raid.help.sr.v1", |section| {
            section.mrkdwn(
                "*Soft reserves*\n• `/sr add <item name or id>`\n• `/sr remove [item id]`\n• `/sr list`\n• `/sr clear`",
            );
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::{
        error_message, help_message, ActionElement, Block, ButtonElement, ButtonStyle,
        MessageBuilder, StaticSelectElement, TextObject,
    };

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("raid.summary.v1", |section| {
                section.mrkdwn("*Molten Core*");
            })
            .actions("raid.summary.actions.v1", |actions| {
                actions.button(ButtonElement::new("raid_manage", "Sign up"));
            })
            .actions("raid.summary.empty.v1", |_| {})
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[0],
            Block::Section {
                block_id,
                text: TextObject::Mrkdwn { .. }
            } if block_id == "raid.summary.v1"
        ));
        assert_eq!(message.action_ids(), vec!["raid_manage"]);
    }

    #[test]
    fn select_preselects_matching_option_only() {
        let select = StaticSelectElement::new("raid_signup_spec", "Spec")
            .option("Tank", "Tank")
            .option("Healer", "Healer")
            .initial(Some("Healer"));
        assert_eq!(select.initial_option.as_ref().map(|o| o.value.as_str()), Some("Healer"));

        let unset = StaticSelectElement::new("raid_signup_spec", "Spec").option("Tank", "Tank").initial(Some("DPS"));
        assert!(unset.initial_option.is_none());
    }

    #[test]
    fn elements_serialize_with_block_kit_type_tags() {
        let button = ActionElement::Button(
            ButtonElement::new("raid_close", "Close").style(ButtonStyle::Danger).value("x"),
        );
        let json = serde_json::to_value(&button).expect("serialize");
        assert_eq!(json["type"], "button");
        assert_eq!(json["text"]["type"], "plain_text");
        assert_eq!(json["style"], "danger");

        let select = ActionElement::StaticSelect(StaticSelectElement::new("raid_signup_class", "Class"));
        assert_eq!(serde_json::to_value(&select).expect("serialize")["type"], "static_select");
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let message = error_message("Cannot process request", "req-123");
        let elements = if let Block::Context { elements, .. } = &message.blocks[1] {
            Some(elements)
        } else {
            None
        };
        assert!(elements.is_some(), "expected context block");
        let elements = elements.expect("context block asserted above");
        assert!(matches!(
            elements.first(),
            Some(TextObject::Plain { text }) if text.contains("req-123")
        ));
    }

    #[test]
    fn help_lists_both_commands() {
        let text = help_message().text();
        assert!(text.contains("/raid create"));
        assert!(text.contains("/sr add"));
    }
}
