//! OpenCode 后端数据类型

use serde::{Deserialize, Serialize};

use crate::dispatch::UNKNOWN_AGENT;

/// 后端 session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// 消息 part 的来源声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// 消息 part（只保留需要的字段）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Part {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
    pub source: Option<PartSource>,
}

impl Part {
    /// 从来源声明推断 Agent 名，无法识别时返回 `unknown`
    pub fn agent_name(&self) -> &str {
        match &self.source {
            Some(source)
                if !source.value.is_empty()
                    && (source.kind.is_empty() || source.kind == "agent") =>
            {
                source.value.as_str()
            }
            _ => UNKNOWN_AGENT,
        }
    }
}

/// 后端推送事件
///
/// 只建模用得到的两类，其余一律归为 `Unrecognized` 并忽略。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// `message.part.updated`
    MessagePartUpdated { part: Part, delta: Option<String> },
    /// `session.idle`
    SessionIdle { session_id: String },
    /// 其他事件类型
    Unrecognized { event_type: String },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    properties: serde_json::Value,
}

#[derive(Deserialize)]
struct PartUpdatedProps {
    part: Part,
    #[serde(default)]
    delta: Option<String>,
}

#[derive(Deserialize)]
struct SessionIdleProps {
    #[serde(rename = "sessionID")]
    session_id: String,
}

impl BackendEvent {
    /// 解析一条 SSE data 负载
    ///
    /// 负载本身不是合法 JSON 时返回错误；已知类型但属性不匹配时降级为 `Unrecognized`。
    pub fn parse(data: &str) -> serde_json::Result<Self> {
        let raw: RawEvent = serde_json::from_str(data)?;

        let event = match raw.event_type.as_str() {
            "message.part.updated" => {
                match serde_json::from_value::<PartUpdatedProps>(raw.properties) {
                    Ok(props) => BackendEvent::MessagePartUpdated {
                        part: props.part,
                        delta: props.delta,
                    },
                    Err(e) => {
                        tracing::warn!("message.part.updated 属性不匹配: {}", e);
                        BackendEvent::Unrecognized {
                            event_type: raw.event_type.clone(),
                        }
                    }
                }
            }
            "session.idle" => match serde_json::from_value::<SessionIdleProps>(raw.properties) {
                Ok(props) => BackendEvent::SessionIdle {
                    session_id: props.session_id,
                },
                Err(e) => {
                    tracing::warn!("session.idle 属性不匹配: {}", e);
                    BackendEvent::Unrecognized {
                        event_type: raw.event_type.clone(),
                    }
                }
            },
            _ => BackendEvent::Unrecognized {
                event_type: raw.event_type.clone(),
            },
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_part_updated() {
        let data = r#"{"type":"message.part.updated","properties":{"part":{"id":"prt_1","sessionID":"ses_123","messageID":"msg_456","type":"text","text":"Hello","source":{"type":"agent","value":"code-reviewer"}},"delta":"Hello"}}"#;

        match BackendEvent::parse(data).unwrap() {
            BackendEvent::MessagePartUpdated { part, delta } => {
                assert_eq!(part.session_id, "ses_123");
                assert_eq!(part.agent_name(), "code-reviewer");
                assert_eq!(delta.as_deref(), Some("Hello"));
            }
            other => panic!("Expected MessagePartUpdated, got {:?}", other),
        }
    }

    #[test]
    fn test_agent_name_fallback() {
        let mut part = Part::default();
        assert_eq!(part.agent_name(), "unknown");

        part.source = Some(PartSource {
            kind: "file".to_string(),
            value: "src/main.rs".to_string(),
        });
        assert_eq!(part.agent_name(), "unknown");

        part.source = Some(PartSource {
            kind: String::new(),
            value: "bug-spotter".to_string(),
        });
        assert_eq!(part.agent_name(), "bug-spotter");
    }

    #[test]
    fn test_parse_session_idle() {
        let data = r#"{"type":"session.idle","properties":{"sessionID":"ses_123"}}"#;
        assert_eq!(
            BackendEvent::parse(data).unwrap(),
            BackendEvent::SessionIdle {
                session_id: "ses_123".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unrecognized() {
        let data = r#"{"type":"server.connected","properties":{}}"#;
        assert_eq!(
            BackendEvent::parse(data).unwrap(),
            BackendEvent::Unrecognized {
                event_type: "server.connected".to_string()
            }
        );

        // 已知类型但属性缺失
        let data = r#"{"type":"session.idle"}"#;
        assert!(matches!(
            BackendEvent::parse(data).unwrap(),
            BackendEvent::Unrecognized { .. }
        ));

        assert!(BackendEvent::parse("not json").is_err());
    }
}
