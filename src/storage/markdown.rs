//! Markdown codec for task lists
//!
//! A task list file is an optional YAML front matter block, a `# Title`
//! line, and a nested checklist:
//!
//! ```text
//! ---
//! last_id: 0000002
//! ---
//! # Release plan
//!
//! - [ ] 1. Cut branch <!-- id:0000001 -->
//!   - Owner: agent-7
//!   - [x] 1.1. Freeze dependencies
//! - [-] 2. Write notes <!-- id:0000002 -->
//!   - Blocked-by: 0000001 (Cut branch)
//!   - Requirements: [3.1](requirements.md#3.1)
//! ```
//!
//! Numbers in the file are informational; positions are recomputed from
//! nesting on decode.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{
    CodecError, DocumentCodec, FrontMatter, PositionId, StableId, Task, TaskList, TaskStatus,
};

/// Largest document accepted by [`MarkdownCodec::decode`]
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

const INDENT: &str = "  ";

fn task_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^- \[([ xX-])\] (\d+(?:\.\d+)*)\.\s+(.*)$").expect("task line pattern")
    })
}

fn checkbox_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^- ?\[(.?)\]\s*\d").expect("checkbox pattern"))
}

fn id_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*<!--\s*id:([a-z0-9]{7})\s*-->").expect("id comment pattern"))
}

fn blocked_by_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^blocked-by:\s*(.*)$").expect("blocked-by pattern"))
}

fn stream_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^stream:\s*(\d+)\s*$").expect("stream pattern"))
}

fn owner_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^owner:\s*(.+)$").expect("owner pattern"))
}

fn requirement_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[([^\]]+)\]\(([^#)]+)#[^)]+\)$").expect("requirement link pattern")
    })
}

/// Reads and writes the markdown checklist format
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownCodec;

impl DocumentCodec for MarkdownCodec {
    fn encode(&self, list: &TaskList) -> Result<String, CodecError> {
        render(list)
    }

    fn decode(&self, text: &str) -> Result<TaskList, CodecError> {
        parse(text)
    }
}

fn render(list: &TaskList) -> Result<String, CodecError> {
    let mut out = String::new();

    if !list.front_matter.is_empty() {
        let yaml = serde_yaml::to_string(&list.front_matter)
            .map_err(|e| CodecError::FrontMatter(e.to_string()))?;
        out.push_str("---\n");
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n");
    }

    out.push_str("# ");
    out.push_str(&list.title);
    out.push_str("\n\n");

    for task in &list.tasks {
        render_task(&mut out, list, task, 0);
    }
    Ok(out)
}

fn render_task(out: &mut String, list: &TaskList, task: &Task, depth: usize) {
    let indent = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);

    out.push_str(&format!(
        "{}- {} {}. {}",
        indent,
        task.status.checkbox(),
        task.id,
        task.title
    ));
    if let Some(id) = &task.stable_id {
        out.push_str(&format!(" <!-- id:{} -->", id));
    }
    out.push('\n');

    for detail in &task.details {
        out.push_str(&format!("{}- {}\n", inner, detail));
    }
    if !task.blocked_by.is_empty() {
        let refs: Vec<String> = task
            .blocked_by
            .iter()
            .map(|id| blocker_label(list, id))
            .collect();
        out.push_str(&format!("{}- Blocked-by: {}\n", inner, refs.join(", ")));
    }
    if let Some(stream) = task.stream {
        out.push_str(&format!("{}- Stream: {}\n", inner, stream));
    }
    if let Some(owner) = &task.owner {
        out.push_str(&format!("{}- Owner: {}\n", inner, owner));
    }
    if !task.references.is_empty() {
        out.push_str(&format!(
            "{}- References: {}\n",
            inner,
            task.references.join(", ")
        ));
    }
    if !task.requirements.is_empty() {
        let file = list.requirements_file();
        let links: Vec<String> = task
            .requirements
            .iter()
            .map(|id| format!("[{}]({}#{})", id, file, id))
            .collect();
        out.push_str(&format!("{}- Requirements: {}\n", inner, links.join(", ")));
    }

    for child in &task.children {
        render_task(out, list, child, depth + 1);
    }
}

/// `id (Title)` when the title can be read back unambiguously, else `id`
fn blocker_label(list: &TaskList, id: &StableId) -> String {
    match list.find_by_stable_id(id) {
        Some(task) if !task.title.contains(['(', ')']) => format!("{} ({})", id, task.title),
        _ => id.to_string(),
    }
}

fn parse(text: &str) -> Result<TaskList, CodecError> {
    if text.len() > MAX_DOCUMENT_BYTES {
        return Err(CodecError::TooLarge {
            size: text.len(),
            limit: MAX_DOCUMENT_BYTES,
        });
    }

    let lines: Vec<&str> = text.lines().collect();
    let (front_matter, start) = parse_front_matter(&lines)?;

    let mut list = TaskList::new("");
    list.front_matter = front_matter;

    let mut title_seen = false;
    let mut open: Vec<Task> = Vec::new();

    for (index, raw) in lines.iter().enumerate().skip(start) {
        let line = index + 1;
        let content = raw.trim();
        if content.is_empty() {
            continue;
        }

        let level = indent_level(raw, line)?;

        if level == 0 && open.is_empty() && list.tasks.is_empty() && !title_seen {
            if let Some(title) = content.strip_prefix('#').filter(|t| !t.starts_with('#')) {
                if title.is_empty() || title.starts_with(' ') {
                    list.title = title.trim().to_string();
                    title_seen = true;
                    continue;
                }
            }
        }

        if content.starts_with("##") {
            return Err(CodecError::Unsupported {
                line,
                what: "section headers are not supported".to_string(),
            });
        }

        if let Some(caps) = task_line().captures(content) {
            if level > open.len() {
                return Err(CodecError::syntax(line, "unexpected indentation"));
            }
            close_to(&mut open, &mut list.tasks, level);

            let mark = caps[1].chars().next().unwrap_or(' ');
            let status = TaskStatus::from_checkbox_mark(mark).unwrap_or_default();
            let (title, stable_id) = split_title(&caps[3]);
            if title.is_empty() {
                return Err(CodecError::syntax(line, "task title is empty"));
            }

            let mut task = Task::new(PositionId::root(1), title);
            task.status = status;
            task.stable_id = stable_id;
            open.push(task);
            continue;
        }

        if let Some(caps) = checkbox_line().captures(content) {
            let mark = &caps[1];
            let message = match mark.chars().next().and_then(TaskStatus::from_checkbox_mark) {
                Some(_) => "invalid task format".to_string(),
                None => format!("invalid status: [{}]", mark),
            };
            return Err(CodecError::syntax(line, message));
        }

        if let Some(item) = content.strip_prefix("- ") {
            if level == 0 || level > open.len() {
                return Err(CodecError::syntax(
                    line,
                    "unexpected content at this indentation level",
                ));
            }
            close_to(&mut open, &mut list.tasks, level);
            if let Some(task) = open.last_mut() {
                apply_item(task, item.trim(), &mut list.requirements_file);
            }
            continue;
        }

        return Err(CodecError::syntax(
            line,
            "unexpected content at this indentation level",
        ));
    }

    close_to(&mut open, &mut list.tasks, 0);
    list.renumber();
    Ok(list)
}

/// Splits off a leading `---` fenced YAML block; returns where the body starts
fn parse_front_matter(lines: &[&str]) -> Result<(FrontMatter, usize), CodecError> {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return Ok((FrontMatter::default(), 0));
    }

    let end = lines
        .iter()
        .skip(1)
        .position(|l| l.trim_end() == "---")
        .map(|p| p + 1)
        .ok_or_else(|| CodecError::FrontMatter("missing closing ---".to_string()))?;

    let yaml = lines[1..end].join("\n");
    if yaml.trim().is_empty() {
        return Ok((FrontMatter::default(), end + 1));
    }

    let front_matter =
        serde_yaml::from_str(&yaml).map_err(|e| CodecError::FrontMatter(e.to_string()))?;
    Ok((front_matter, end + 1))
}

fn indent_level(raw: &str, line: usize) -> Result<usize, CodecError> {
    let indent = &raw[..raw.len() - raw.trim_start().len()];
    if indent.contains('\t') {
        return Err(CodecError::syntax(
            line,
            "unexpected indentation (tabs not allowed)",
        ));
    }
    if indent.chars().any(|c| c != ' ') || indent.len() % 2 != 0 {
        return Err(CodecError::syntax(line, "unexpected indentation"));
    }
    Ok(indent.len() / 2)
}

/// Pops open tasks until `depth` remain, attaching each to its parent
fn close_to(open: &mut Vec<Task>, roots: &mut Vec<Task>, depth: usize) {
    while open.len() > depth {
        let Some(task) = open.pop() else { break };
        match open.last_mut() {
            Some(parent) => parent.children.push(task),
            None => roots.push(task),
        }
    }
}

fn split_title(raw: &str) -> (String, Option<StableId>) {
    let re = id_comment();
    let stable_id = re
        .captures(raw)
        .and_then(|caps| caps[1].parse::<StableId>().ok());
    let title = re.replace_all(raw, "");
    (title.trim().to_string(), stable_id)
}

/// Interprets a `- ` line under a task as metadata or a detail
///
/// The first requirement link seen names the document's requirements file.
fn apply_item(task: &mut Task, item: &str, requirements_file: &mut Option<String>) {
    if let Some(caps) = blocked_by_line().captures(item) {
        let ids = parse_blocker_refs(&caps[1]);
        if !ids.is_empty() {
            for id in ids {
                task.add_blocker(id);
            }
            return;
        }
    }

    if let Some(caps) = stream_line().captures(item) {
        if let Ok(stream) = caps[1].parse::<u32>() {
            if stream > 0 {
                task.stream = Some(stream);
                return;
            }
        }
    }

    if let Some(caps) = owner_line().captures(item) {
        let owner = caps[1].trim();
        if !owner.is_empty() {
            task.owner = Some(owner.to_string());
            return;
        }
    }

    if let Some(refs) = item.strip_prefix("References: ") {
        task.references = refs
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        return;
    }

    if let Some(links) = item.strip_prefix("Requirements: ") {
        let (ids, file) = parse_requirement_links(links);
        if !ids.is_empty() {
            task.requirements = ids;
            if requirements_file.is_none() {
                *requirements_file = file;
            }
            return;
        }
    }

    task.details.push(item.to_string());
}

/// Reads `[1.1](requirements.md#1.1), ...`; malformed links are skipped
fn parse_requirement_links(value: &str) -> (Vec<PositionId>, Option<String>) {
    let mut ids = Vec::new();
    let mut file = None;

    for part in value.split(',') {
        let Some(caps) = requirement_link().captures(part.trim()) else {
            continue;
        };
        if let Ok(id) = caps[1].trim().parse::<PositionId>() {
            ids.push(id);
            if file.is_none() {
                file = Some(caps[2].trim().to_string());
            }
        }
    }

    (ids, file)
}

/// Reads `id (Title), id, ...`; parenthesised hints are skipped
fn parse_blocker_refs(value: &str) -> Vec<StableId> {
    let mut ids = Vec::new();
    let mut rest = value.trim_start();

    while !rest.is_empty() {
        let end = rest
            .find(|c: char| c.is_whitespace() || c == ',' || c == '(')
            .unwrap_or(rest.len());
        if let Ok(id) = rest[..end].parse::<StableId>() {
            ids.push(id);
        }
        rest = rest[end..].trim_start();

        if rest.starts_with('(') {
            rest = skip_parenthesised(rest);
        }
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    }

    ids
}

fn skip_parenthesised(s: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &s[i + 1..];
                }
            }
            _ => {}
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AddOperation, BatchEngine, Operation, UpdateOperation};
    use proptest::prelude::*;

    const SAMPLE: &str = "\
---
references:
- docs/design.md
metadata:
  team: platform
last_id: 000000c
---
# Release plan

- [ ] 1. Cut branch <!-- id:0000001 -->
  - Coordinate with QA first
  - Owner: agent-7
  - [x] 1.1. Freeze dependencies
  - [-] 1.2. Tag release candidate
    - References: docs/release.md, CHANGELOG.md
- [ ] 2. Write notes <!-- id:0000002 -->
  - Blocked-by: 0000001 (Cut branch)
  - Stream: 2
";

    fn pos(s: &str) -> PositionId {
        s.parse().unwrap()
    }

    fn decode(text: &str) -> TaskList {
        MarkdownCodec.decode(text).unwrap()
    }

    #[test]
    fn decodes_structure_and_metadata() {
        let list = decode(SAMPLE);

        assert_eq!(list.title, "Release plan");
        assert_eq!(list.front_matter.references, vec!["docs/design.md"]);
        assert_eq!(list.front_matter.metadata["team"], "platform");
        assert_eq!(list.front_matter.last_id.as_ref().unwrap().as_str(), "000000c");

        let first = list.find(&pos("1")).unwrap();
        assert_eq!(first.title, "Cut branch");
        assert_eq!(first.stable_id.as_ref().unwrap().as_str(), "0000001");
        assert_eq!(first.details, vec!["Coordinate with QA first"]);
        assert_eq!(first.owner.as_deref(), Some("agent-7"));
        assert_eq!(first.children.len(), 2);

        assert_eq!(list.find(&pos("1.1")).unwrap().status, TaskStatus::Completed);
        let rc = list.find(&pos("1.2")).unwrap();
        assert_eq!(rc.status, TaskStatus::InProgress);
        assert_eq!(rc.references, vec!["docs/release.md", "CHANGELOG.md"]);

        let second = list.find(&pos("2")).unwrap();
        assert_eq!(second.blocked_by, vec!["0000001".parse::<StableId>().unwrap()]);
        assert_eq!(second.stream, Some(2));
    }

    #[test]
    fn encode_reproduces_canonical_text() {
        let list = decode(SAMPLE);
        let encoded = MarkdownCodec.encode(&list).unwrap();
        let again = decode(&encoded);

        assert_eq!(again.tasks, list.tasks);
        assert_eq!(again.front_matter, list.front_matter);
        assert_eq!(MarkdownCodec.encode(&again).unwrap(), encoded);
        assert!(encoded.contains("  - Blocked-by: 0000001 (Cut branch)\n"));
    }

    #[test]
    fn numbers_in_file_are_recomputed() {
        let list = decode("# T\n\n- [ ] 7. First\n- [ ] 3. Second\n  - [ ] 9.9. Child\n");
        assert_eq!(list.find(&pos("2.1")).unwrap().title, "Child");
        assert_eq!(list.find(&pos("1")).unwrap().title, "First");
    }

    #[test]
    fn blocker_hint_omitted_for_parenthesised_titles() {
        let mut list = TaskList::new("Plan");
        list.insert(None, None, Task::new(PositionId::root(1), "Setup (phase one)"));
        list.insert(None, None, Task::new(PositionId::root(1), "Build"));
        let blocker = list.ensure_stable_id(&pos("1")).unwrap().unwrap();
        list.ensure_stable_id(&pos("2")).unwrap();
        list.find_mut(&pos("2")).unwrap().add_blocker(blocker.clone());

        let text = MarkdownCodec.encode(&list).unwrap();
        assert!(text.contains(&format!("- Blocked-by: {}\n", blocker)));
        assert_eq!(decode(&text).find(&pos("2")).unwrap().blocked_by, vec![blocker]);
    }

    #[test]
    fn blocker_refs_tolerate_nested_hints() {
        let ids = parse_blocker_refs("0000001 (Fix (urgent), later), 0000002, bogus (x)");
        let ids: Vec<&str> = ids.iter().map(StableId::as_str).collect();
        assert_eq!(ids, vec!["0000001", "0000002"]);
    }

    #[test]
    fn metadata_labels_are_case_insensitive() {
        let list = decode("# T\n\n- [ ] 1. Task\n  - blocked-BY: 0000003\n  - STREAM: 4\n  - owner:  bob \n");
        let task = list.find(&pos("1")).unwrap();
        assert_eq!(task.blocked_by.len(), 1);
        assert_eq!(task.stream, Some(4));
        assert_eq!(task.owner.as_deref(), Some("bob"));
        assert!(task.details.is_empty());
    }

    #[test]
    fn malformed_metadata_falls_back_to_detail() {
        let list = decode("# T\n\n- [ ] 1. Task\n  - Stream: zero\n  - Blocked-by: nothing here\n");
        let task = list.find(&pos("1")).unwrap();
        assert_eq!(task.stream, None);
        assert_eq!(task.details, vec!["Stream: zero", "Blocked-by: nothing here"]);
    }

    #[test]
    fn empty_document() {
        let list = decode("# Empty\n");
        assert_eq!(list.title, "Empty");
        assert!(list.tasks.is_empty());

        let list = decode("");
        assert_eq!(list.title, "");
        assert_eq!(MarkdownCodec.encode(&list).unwrap(), "# \n\n");
        assert_eq!(decode("# \n\n").title, "");
    }

    #[test]
    fn tabs_are_rejected_with_line_number() {
        let err = MarkdownCodec
            .decode("# T\n\n- [ ] 1. Task\n\t- detail\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "line 4: unexpected indentation (tabs not allowed)");
    }

    #[test]
    fn irregular_indentation_is_rejected() {
        assert!(MarkdownCodec.decode("# T\n\n- [ ] 1. Task\n   - detail\n").is_err());
        assert!(MarkdownCodec
            .decode("# T\n\n- [ ] 1. Task\n    - [ ] 1.1. Too deep\n")
            .is_err());
        assert!(MarkdownCodec.decode("# T\n\n  - [ ] 1. Orphan\n").is_err());
        assert!(MarkdownCodec.decode("# T\n\nstray paragraph\n").is_err());
    }

    #[test]
    fn invalid_checkbox_is_rejected() {
        let err = MarkdownCodec.decode("# T\n\n- [?] 1. Task\n").unwrap_err();
        assert_eq!(err.to_string(), "line 3: invalid status: [?]");

        let err = MarkdownCodec.decode("# T\n\n- [x] 1 missing dot\n").unwrap_err();
        assert_eq!(err.to_string(), "line 3: invalid task format");
    }

    #[test]
    fn section_headers_are_unsupported() {
        let err = MarkdownCodec
            .decode("# T\n\n## Phase one\n- [ ] 1. Task\n")
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported { line: 3, .. }));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let text = "x".repeat(MAX_DOCUMENT_BYTES + 1);
        assert!(matches!(
            MarkdownCodec.decode(&text),
            Err(CodecError::TooLarge { .. })
        ));
    }

    #[test]
    fn unterminated_front_matter_is_rejected() {
        assert!(matches!(
            MarkdownCodec.decode("---\nlast_id: 0000001\n# T\n"),
            Err(CodecError::FrontMatter(_))
        ));
    }

    #[test]
    fn crlf_input_is_accepted() {
        let list = decode("# T\r\n\r\n- [x] 1. Done\r\n  - note\r\n");
        let task = list.find(&pos("1")).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.details, vec!["note"]);
    }

    #[test]
    fn engine_round_trips_through_markdown() {
        let mut list = decode(SAMPLE);
        let ops: Vec<Operation> = vec![
            AddOperation::new("Announce")
                .blocked_by(["2", "1.1"])
                .into(),
            UpdateOperation::new("1.2")
                .status(TaskStatus::Completed)
                .into(),
            Operation::remove("0000002"),
        ];

        let result = BatchEngine::new(&MarkdownCodec)
            .execute(&mut list, &ops, false)
            .unwrap();
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.auto_completed.iter().collect::<Vec<_>>(), vec!["1"]);

        // removed blocker edge is gone; the other one survives the round trip
        let text = MarkdownCodec.encode(&list).unwrap();
        let reread = decode(&text);
        let announce = reread.find(&pos("2")).unwrap();
        assert_eq!(announce.title, "Announce");
        assert_eq!(announce.blocked_by.len(), 1);
        assert_eq!(reread.front_matter.last_id, list.front_matter.last_id);
        assert_eq!(reread.front_matter.last_id.unwrap().as_str(), "000000e");
    }

    #[test]
    fn structured_metadata_survives_round_trip() {
        let text = "\
---
metadata:
  team: platform
  tags:
  - backend
  - urgent
  review:
    required: true
    approvers: 2
---
# Plan
";
        let list = decode(text);
        let metadata = &list.front_matter.metadata;
        assert_eq!(metadata["team"], "platform");
        assert_eq!(
            metadata["tags"],
            serde_yaml::from_str::<serde_yaml::Value>("[backend, urgent]").unwrap()
        );
        assert_eq!(metadata["review"]["approvers"], 2);

        let reread = decode(&MarkdownCodec.encode(&list).unwrap());
        assert_eq!(reread.front_matter, list.front_matter);
    }

    #[test]
    fn requirements_render_as_links() {
        let mut list = TaskList::new("Plan");
        let mut task = Task::new(PositionId::root(1), "Login form");
        task.requirements = vec![pos("1.1"), pos("2")];
        list.insert(None, None, task);

        let text = MarkdownCodec.encode(&list).unwrap();
        assert!(text.contains(
            "  - Requirements: [1.1](requirements.md#1.1), [2](requirements.md#2)\n"
        ));

        list.requirements_file = Some("specs/login.md".to_string());
        let text = MarkdownCodec.encode(&list).unwrap();
        let reread = decode(&text);
        assert_eq!(reread.tasks, list.tasks);
        assert_eq!(reread.requirements_file.as_deref(), Some("specs/login.md"));
    }

    #[test]
    fn malformed_requirement_links_fall_back_to_detail() {
        let list = decode(
            "# T\n\n- [ ] 1. Task\n  - Requirements: see below\n  - Requirements: [1](r.md#1), [x](r.md#x)\n",
        );
        let task = list.find(&pos("1")).unwrap();
        assert_eq!(task.details, vec!["Requirements: see below"]);
        assert_eq!(task.requirements, vec![pos("1")]);
        assert_eq!(list.requirements_file.as_deref(), Some("r.md"));
    }

    #[test]
    fn unencodable_text_never_reaches_the_file() {
        let mut list = decode(SAMPLE);
        let engine = BatchEngine::new(&MarkdownCodec);
        let before = list.clone();

        let ops: Vec<Operation> = vec![
            AddOperation {
                details: vec!["[ ] 1. Sneaky".to_string()],
                ..AddOperation::new("Carrier")
            }
            .into(),
            AddOperation::new("Thief <!-- id:0000001 -->").into(),
        ];
        for op in ops {
            let result = engine.execute(&mut list, &[op], false).unwrap();
            assert!(!result.success);
        }
        assert_eq!(list, before);
    }

    fn title_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z][A-Za-z0-9 ()-]{0,30}[A-Za-z0-9]",
            "[ -~]{1,40}",
            "[A-Za-z ]{1,10}<!-- ?id:[a-z0-9]{7} ?-->[A-Za-z ]{0,10}",
        ]
    }

    fn detail_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[ -~]{1,40}",
            "(- )?\\[[ xX-]?\\] ?[0-9][ -~]{0,12}",
            "(Blocked-by|Stream|Owner|References|Requirements|Note): ?[ -~]{0,20}",
        ]
    }

    proptest! {
        #[test]
        fn accepted_edits_round_trip(
            entries in prop::collection::vec((title_strategy(), detail_strategy()), 1..8),
            stream in 0i64..5,
        ) {
            let mut list = TaskList::new("Generated");
            let engine = BatchEngine::new(&MarkdownCodec);

            for (title, detail) in &entries {
                let add = AddOperation {
                    details: vec![detail.clone()],
                    stream: Some(stream),
                    ..AddOperation::new(title.clone())
                };
                // rejected edits leave the list alone; accepted ones must survive the file
                engine.execute(&mut list, &[add.into()], false).unwrap();
            }

            let decoded = MarkdownCodec
                .decode(&MarkdownCodec.encode(&list).unwrap())
                .unwrap();
            prop_assert_eq!(decoded.tasks, list.tasks);
        }
    }
}
