//! Command execution.

use crate::scenario::{parse_tag, Scenario, ScenarioReport};
use crate::Commands;
use colored::Colorize;
use ropstate_codec::attachment::*;
use ropstate_codec::message::*;
use ropstate_codec::{
    Decode, DecodeWith, PropertyTag, RopBuffer, RopId, RopResponse, TableRequest, TableResponse,
};
use ropstate_core::{Config, Operation, ServerGeneration};
use serde::Serialize;
use std::error::Error;

type CommandResult<T> = Result<T, Box<dyn Error>>;

/// Formatted command output and whether the command succeeded.
pub struct Output {
    pub text: String,
    pub success: bool,
}

impl Output {
    fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }
}

/// Executes a command and returns the formatted output.
pub fn execute(cmd: Commands, mut config: Config) -> CommandResult<Output> {
    match cmd {
        Commands::Run {
            scenario,
            generation,
            json,
        } => {
            let content = std::fs::read_to_string(&scenario)
                .map_err(|e| format!("cannot read {}: {}", scenario.display(), e))?;
            let scenario = Scenario::from_yaml(&content)?;
            if let Some(generation) = generation.or(scenario.generation) {
                config.behavior.generation = Some(generation);
            }
            let behavior = config.resolve()?;
            tracing::info!(
                "Running scenario '{}' ({} steps)",
                scenario.name,
                scenario.steps.len()
            );
            let report = scenario.run(behavior, config.limits.max_rows_per_query)?;
            let success = report.passed();
            let text = if json {
                format_json(&report)?
            } else {
                format_report(&report)
            };
            Ok(Output { text, success })
        }

        Commands::Decode {
            hex,
            response,
            buffer,
            columns,
        } => {
            let bytes = hex::decode(hex.trim().trim_start_matches("0x"))?;
            let columns = columns
                .iter()
                .map(|c| parse_tag(c))
                .collect::<CommandResult<Vec<_>>>()?;
            let value = if buffer {
                decode_buffer(&bytes, response, &columns)?
            } else {
                decode_single(&bytes, response, &columns)?
            };
            Ok(Output::ok(format_json(&value)?))
        }

        Commands::Behavior { generation } => {
            if let Some(generation) = generation {
                config.behavior.generation = Some(generation);
            }
            let behavior = config.resolve()?;
            Ok(Output::ok(serde_yaml::to_string(&behavior)?))
        }

        Commands::Rops { name } => {
            let ids: Vec<RopId> = match name {
                Some(name) => vec![RopId::parse_name(&name)
                    .ok_or_else(|| format!("unknown ROP name: {}", name))?],
                None => RopId::ALL.to_vec(),
            };
            let lines: Vec<String> = ids
                .iter()
                .map(|id| {
                    let kind = if Operation::from_rop_id(*id).is_some() {
                        "table".cyan()
                    } else {
                        "message".dimmed()
                    };
                    format!("{:#04x}  {:<26} {}", *id as u8, id.to_string(), kind)
                })
                .collect();
            Ok(Output::ok(lines.join("\n")))
        }
    }
}

/// Names accepted by `--generation`.
pub fn parse_generation(s: &str) -> Result<ServerGeneration, String> {
    s.parse()
}

fn format_json<T: Serialize>(value: &T) -> CommandResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn format_report(report: &ScenarioReport) -> String {
    let mut out = vec![format!("Scenario {}", report.name.cyan()).bold().to_string()];
    for step in &report.steps {
        let mark = if step.passed {
            "ok".green()
        } else {
            "FAIL".red()
        };
        let code = if step.actual == step.expected {
            step.actual.to_string()
        } else {
            format!("{} (expected {})", step.actual, step.expected)
        };
        let mut line = format!("{:>3} {:<4} {:<24} {}", step.index, mark, step.rop, code);
        if !step.detail.is_empty() {
            line = format!("{}  {}", line, step.detail.dimmed());
        }
        out.push(line);
    }
    let summary = if report.passed() {
        format!("{} steps passed", report.steps.len()).green()
    } else {
        format!(
            "{} of {} steps failed",
            report.failures(),
            report.steps.len()
        )
        .red()
    };
    out.push(summary.to_string());
    out.join("\n")
}

fn rop_id_of(bytes: &[u8]) -> CommandResult<RopId> {
    let first = *bytes.first().ok_or("empty input")?;
    Ok(RopId::from_u8(first)?)
}

/// Decodes exactly one ROP, failing on trailing bytes.
fn decode_single(
    bytes: &[u8],
    response: bool,
    columns: &[PropertyTag],
) -> CommandResult<serde_json::Value> {
    let (value, consumed) = decode_rop(bytes, 0, response, columns)?;
    if consumed != bytes.len() {
        return Err(format!("{} trailing bytes after ROP", bytes.len() - consumed).into());
    }
    Ok(value)
}

fn decode_buffer(
    bytes: &[u8],
    response: bool,
    columns: &[PropertyTag],
) -> CommandResult<serde_json::Value> {
    let (buffer, _) = RopBuffer::decode_at(bytes, 0)?;
    let mut rops = Vec::new();
    let mut offset = 0;
    while offset < buffer.rops.len() {
        let (value, consumed) = decode_rop(&buffer.rops, offset, response, columns)?;
        rops.push(value);
        offset += consumed;
    }
    Ok(serde_json::json!({
        "rops": rops,
        "handles": buffer
            .handles
            .iter()
            .map(|h| format!("{:#010x}", h))
            .collect::<Vec<_>>(),
    }))
}

fn decode_rop(
    bytes: &[u8],
    offset: usize,
    response: bool,
    columns: &[PropertyTag],
) -> CommandResult<(serde_json::Value, usize)> {
    let id = rop_id_of(&bytes[offset..])?;

    macro_rules! plain {
        ($ty:ty) => {{
            let (v, n) = <$ty>::decode_at(bytes, offset)?;
            (serde_json::to_value(v)?, n)
        }};
    }
    macro_rules! with_columns {
        ($ty:ty) => {{
            let (v, n) = <$ty>::decode_at_with(bytes, offset, columns)?;
            (serde_json::to_value(v)?, n)
        }};
    }

    if Operation::from_rop_id(id).is_some() {
        return Ok(if response {
            with_columns!(TableResponse)
        } else {
            plain!(TableRequest)
        });
    }

    let (value, consumed) = match (id, response) {
        (RopId::OpenMessage, false) => plain!(OpenMessageRequest),
        (RopId::OpenMessage, true) => plain!(RopResponse<OpenMessageResponse>),
        (RopId::CreateMessage, false) => plain!(CreateMessageRequest),
        (RopId::CreateMessage, true) => plain!(RopResponse<CreateMessageResponse>),
        (RopId::SaveChangesMessage, false) => plain!(SaveChangesMessageRequest),
        (RopId::SaveChangesMessage, true) => plain!(RopResponse<SaveChangesMessageResponse>),
        (RopId::RemoveAllRecipients, false) => plain!(RemoveAllRecipientsRequest),
        (RopId::RemoveAllRecipients, true) => plain!(RopResponse<RemoveAllRecipientsResponse>),
        (RopId::ModifyRecipients, false) => plain!(ModifyRecipientsRequest),
        (RopId::ModifyRecipients, true) => plain!(RopResponse<ModifyRecipientsResponse>),
        (RopId::ReadRecipients, false) => plain!(ReadRecipientsRequest),
        (RopId::ReadRecipients, true) => with_columns!(RopResponse<ReadRecipientsResponse>),
        (RopId::GetMessageStatus, false) => plain!(GetMessageStatusRequest),
        (RopId::GetMessageStatus, true) => plain!(RopResponse<GetMessageStatusResponse>),
        (RopId::SetMessageStatus, false) => plain!(SetMessageStatusRequest),
        (RopId::SetMessageStatus, true) => plain!(RopResponse<SetMessageStatusResponse>),
        (RopId::GetAttachmentTable, false) => plain!(GetAttachmentTableRequest),
        (RopId::GetAttachmentTable, true) => plain!(RopResponse<GetAttachmentTableResponse>),
        (RopId::OpenAttachment, false) => plain!(OpenAttachmentRequest),
        (RopId::OpenAttachment, true) => plain!(RopResponse<OpenAttachmentResponse>),
        (RopId::CreateAttachment, false) => plain!(CreateAttachmentRequest),
        (RopId::CreateAttachment, true) => plain!(RopResponse<CreateAttachmentResponse>),
        (RopId::DeleteAttachment, false) => plain!(DeleteAttachmentRequest),
        (RopId::DeleteAttachment, true) => plain!(RopResponse<DeleteAttachmentResponse>),
        (RopId::SaveChangesAttachment, false) => plain!(SaveChangesAttachmentRequest),
        (RopId::SaveChangesAttachment, true) => {
            plain!(RopResponse<SaveChangesAttachmentResponse>)
        }
        (other, _) => return Err(format!("{} has no decoder", other).into()),
    };
    Ok((
        serde_json::json!({ "rop": id, "body": value }),
        consumed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ropstate_codec::property::tags;
    use ropstate_codec::table::{QueryPositionRequest, QueryRowsRequest};
    use ropstate_codec::{Encode, QueryRowsFlags, RopHeader};
    use std::io::Write;

    #[test]
    fn test_decode_single_table_request() {
        let req = TableRequest::QueryRows(QueryRowsRequest {
            header: RopHeader::new(0, 2),
            flags: QueryRowsFlags::new(),
            forward_read: true,
            row_count: 5,
        });
        let bytes = req.to_bytes().unwrap();
        let value = decode_single(&bytes, false, &[]).unwrap();
        assert_eq!(value, serde_json::to_value(&req).unwrap());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let req = TableRequest::QueryPosition(QueryPositionRequest {
            header: RopHeader::new(0, 0),
        });
        let mut bytes = req.to_bytes().unwrap().to_vec();
        bytes.push(0);
        assert!(decode_single(&bytes, false, &[]).is_err());
        assert!(decode_single(&[], false, &[]).is_err());
        assert!(decode_single(&[0xEE], false, &[]).is_err());
    }

    #[test]
    fn test_decode_message_response() {
        let response = RopResponse::success(
            1,
            GetMessageStatusResponse {
                message_status_flags: 0x1000,
            },
        );
        let bytes = response.to_bytes().unwrap();
        let value = decode_single(&bytes, true, &[]).unwrap();
        assert_eq!(value["rop"], "GET_MESSAGE_STATUS");
        assert_eq!(value["body"]["handle_index"], 1);
    }

    #[test]
    fn test_decode_buffer() {
        let reqs = vec![
            TableRequest::QueryPosition(QueryPositionRequest {
                header: RopHeader::new(0, 0),
            }),
            TableRequest::QueryPosition(QueryPositionRequest {
                header: RopHeader::new(0, 1),
            }),
        ];
        let buffer = RopBuffer::from_rops(&reqs, vec![0x10, 0x20]).unwrap();
        let bytes = buffer.to_bytes().unwrap();
        let value = decode_buffer(&bytes, false, &[tags::SUBJECT]).unwrap();
        assert_eq!(value["rops"].as_array().unwrap().len(), 2);
        assert_eq!(value["handles"][1], "0x00000020");
    }

    #[test]
    fn test_run_reports_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name: t\ntable_type: rules\ncolumns: [subject]\nsteps:\n  - op: reset_table\n"
        )
        .unwrap();
        let cmd = Commands::Run {
            scenario: file.path().to_path_buf(),
            generation: Some(ServerGeneration::Exchange2010),
            json: true,
        };
        let output = execute(cmd, Config::default()).unwrap();
        assert!(!output.success);
        let report: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(report["steps"][0]["actual"], "NOT_SUPPORTED");
    }

    #[test]
    fn test_behavior_requires_generation() {
        let cmd = Commands::Behavior { generation: None };
        assert!(execute(cmd, Config::default()).is_err());

        let cmd = Commands::Behavior {
            generation: Some(ServerGeneration::Exchange2013),
        };
        let output = execute(cmd, Config::default()).unwrap();
        assert!(output.text.contains("expand_row_max_row_count: not_supported"));
    }
}
