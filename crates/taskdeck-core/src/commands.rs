use std::io;

use anyhow::anyhow;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::Config;
use crate::render::Renderer;
use crate::session::{CommitOutcome, FormSession};
use crate::store::TaskStore;
use crate::view::{self, ViewOptions};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "info", "edit", "done", "subtask", "delete", "clear", "export", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Local::now().naive_local();
    let mut session = FormSession::new(cfg);

    debug!(
        command = %inv.command,
        args = ?inv.args,
        "dispatching command"
    );

    match inv.command.as_str() {
        "add" => cmd_add(store, &mut session, &inv.args),
        "list" => cmd_list(store, cfg, renderer, &inv.args, now),
        "info" => cmd_info(store, renderer, &inv.args, now),
        "edit" => cmd_edit(store, &mut session, &inv.args),
        "done" => cmd_done(store, &inv.args),
        "subtask" => cmd_subtask(store, &inv.args),
        "delete" => cmd_delete(store, &mut session, &inv.args),
        "clear" => cmd_clear(store, &inv.args),
        "export" => cmd_export(store),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Bare words become the title; `key:value` tokens set the other draft
/// fields. `sub:` may repeat, appending draft subtasks.
fn apply_draft_args(session: &mut FormSession, args: &[String]) -> anyhow::Result<()> {
    let mut title_words: Vec<&str> = Vec::new();

    for arg in args {
        if let Some(value) = arg.strip_prefix("desc:") {
            session.draft.description = value.to_string();
        } else if let Some(value) = arg.strip_prefix("due:") {
            let date = value
                .parse::<NaiveDate>()
                .map_err(|_| anyhow!("invalid due date: {value} (expected YYYY-MM-DD)"))?;
            session.draft.due_date = Some(date);
        } else if let Some(value) = arg.strip_prefix("time:") {
            let time = NaiveTime::parse_from_str(value, "%H:%M")
                .map_err(|_| anyhow!("invalid due time: {value} (expected HH:MM)"))?;
            session.draft.due_time = Some(time);
        } else if let Some(value) = arg.strip_prefix("priority:") {
            session.draft.priority = value.parse()?;
        } else if let Some(value) = arg.strip_prefix("category:") {
            session.draft.category = value.to_string();
        } else if let Some(value) = arg.strip_prefix("recur:") {
            session.draft.recurrence = value.parse()?;
        } else if let Some(value) = arg.strip_prefix("sub:") {
            session.add_draft_subtask(value);
        } else {
            title_words.push(arg);
        }
    }

    if !title_words.is_empty() {
        session.draft.title = title_words.join(" ");
    }

    Ok(())
}

fn resolve_display_arg(store: &TaskStore, arg: &str) -> anyhow::Result<Uuid> {
    let id = arg
        .parse::<u64>()
        .map_err(|_| anyhow!("invalid task id: {arg}"))?;
    store
        .find_by_display_id(id)
        .ok_or_else(|| anyhow!("no task with id {id}"))
}

fn display_id(store: &TaskStore, uuid: Uuid) -> String {
    store
        .get(uuid)
        .and_then(|t| t.id)
        .map(|id| id.to_string())
        .unwrap_or_else(|| uuid.to_string())
}

#[instrument(skip(store, session, args))]
fn cmd_add(
    store: &mut TaskStore,
    session: &mut FormSession,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command add");

    apply_draft_args(session, args)?;
    match session.commit(store)? {
        CommitOutcome::Created(uuid) => {
            println!("Created task {}.", display_id(store, uuid));
        }
        CommitOutcome::Rejected => {
            println!("Task not created: title, desc: and due: are required.");
        }
        CommitOutcome::Updated(_) => unreachable!("add never starts in editing state"),
    }
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_list(
    store: &TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    info!("command list");

    let opts = ViewOptions::parse(args, cfg.default_sort())?;
    let visible = view::apply(store.tasks(), &opts);
    renderer.print_task_table(io::stdout().lock(), &visible, store.len(), now)
}

#[instrument(skip(store, renderer, args, now))]
fn cmd_info(
    store: &TaskStore,
    renderer: &mut Renderer,
    args: &[String],
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    info!("command info");

    let arg = args.first().ok_or_else(|| anyhow!("info requires a task id"))?;
    let uuid = resolve_display_arg(store, arg)?;
    let task = store
        .get(uuid)
        .ok_or_else(|| anyhow!("no task with uuid {uuid}"))?;
    renderer.print_task_detail(task, now)
}

#[instrument(skip(store, session, args))]
fn cmd_edit(
    store: &mut TaskStore,
    session: &mut FormSession,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command edit");

    let arg = args.first().ok_or_else(|| anyhow!("edit requires a task id"))?;
    let uuid = resolve_display_arg(store, arg)?;

    session.start_edit(store, uuid)?;
    apply_draft_args(session, &args[1..])?;
    match session.commit(store)? {
        CommitOutcome::Updated(uuid) => {
            println!("Updated task {}.", display_id(store, uuid));
        }
        CommitOutcome::Rejected => {
            println!("Task not updated: title, desc: and due: must stay non-empty.");
        }
        CommitOutcome::Created(_) => unreachable!("edit always starts in editing state"),
    }
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_done(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command done");

    let arg = args.first().ok_or_else(|| anyhow!("done requires a task id"))?;
    let uuid = resolve_display_arg(store, arg)?;

    let spawned = store.toggle_complete(uuid)?;
    let task = store
        .get(uuid)
        .ok_or_else(|| anyhow!("no task with uuid {uuid}"))?;
    if task.completed {
        println!("Completed task {}.", display_id(store, uuid));
    } else {
        println!("Marked task {} incomplete.", display_id(store, uuid));
    }

    if let Some(successor) = spawned
        && let Some(next) = store.get(successor)
    {
        println!(
            "Created recurring task {} due {}.",
            display_id(store, successor),
            next.due_date.format("%Y-%m-%d")
        );
    }
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_subtask(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command subtask");

    let (id_arg, index_arg) = match args {
        [id, index, ..] => (id, index),
        _ => return Err(anyhow!("subtask requires a task id and a subtask number")),
    };
    let uuid = resolve_display_arg(store, id_arg)?;
    let number = index_arg
        .parse::<usize>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| anyhow!("invalid subtask number: {index_arg}"))?;

    store.toggle_subtask(uuid, number - 1)?;

    let task = store
        .get(uuid)
        .ok_or_else(|| anyhow!("no task with uuid {uuid}"))?;
    let sub = &task.subtasks[number - 1];
    println!(
        "Subtask {} of task {} is now {}.",
        number,
        display_id(store, uuid),
        if sub.completed { "done" } else { "open" }
    );
    let (done, total) = task.subtask_progress();
    println!(
        "Task {} is {} ({done}/{total} subtasks done).",
        display_id(store, uuid),
        if task.completed { "completed" } else { "incomplete" }
    );
    Ok(())
}

#[instrument(skip(store, session, args))]
fn cmd_delete(
    store: &mut TaskStore,
    session: &mut FormSession,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");

    let arg = args.first().ok_or_else(|| anyhow!("delete requires a task id"))?;
    let uuid = resolve_display_arg(store, arg)?;
    let id = display_id(store, uuid);

    session.notify_deleted(uuid);
    store.delete(uuid)?;
    println!("Deleted task {id}.");
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_clear(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command clear");

    if store.is_empty() {
        println!("Nothing to clear.");
        return Ok(());
    }
    if args.first().map(String::as_str) != Some("yes") {
        println!("This removes every task and cannot be undone.");
        println!("Run 'taskdeck clear yes' to confirm.");
        return Ok(());
    }

    let count = store.len();
    store.clear_all()?;
    println!("Cleared {count} task(s).");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_export(store: &TaskStore) -> anyhow::Result<()> {
    info!("command export");

    let json = serde_json::to_string_pretty(store.tasks())?;
    println!("{json}");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: taskdeck [options] <command> [args]");
    println!();
    println!("commands:");
    println!("  add <title words> [desc:TEXT] [due:YYYY-MM-DD] [time:HH:MM]");
    println!("      [priority:low|medium|high] [category:NAME] [recur:none|daily|weekly]");
    println!("      [sub:TITLE ...]        create a task");
    println!("  list [all|completed|incomplete] [search:WORD] [due:YYYY-MM-DD]");
    println!("      [sort:due|priority|completed]");
    println!("                             show the task list");
    println!("  info <id>                  show one task in full");
    println!("  edit <id> [fields...]      change fields of a task");
    println!("  done <id>                  toggle completion (spawns recurrences)");
    println!("  subtask <id> <n>           toggle the n-th subtask");
    println!("  delete <id>                delete a task");
    println!("  clear yes                  delete every task");
    println!("  export                     print all tasks as JSON");
    println!("  version                    print the version");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::{apply_draft_args, expand_command_abbrev, known_command_names, resolve_display_arg};
    use crate::config::Config;
    use crate::session::FormSession;
    use crate::store::TaskStore;
    use crate::task::{Priority, Recurrence};

    fn session() -> FormSession {
        let cfg = Config::load(Some(Path::new("/dev/null"))).expect("load config");
        FormSession::new(&cfg)
    }

    #[test]
    fn abbreviations_expand_when_unambiguous() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("lis", &known), Some("list"));
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("export", &known), Some("export"));
        // "d" could be done or delete
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn draft_args_fill_the_session_draft() {
        let mut session = session();
        apply_draft_args(
            &mut session,
            &[
                "Plan".to_string(),
                "sprint".to_string(),
                "desc:two weeks".to_string(),
                "due:2024-01-10".to_string(),
                "time:09:30".to_string(),
                "priority:high".to_string(),
                "category:Personal".to_string(),
                "recur:weekly".to_string(),
                "sub:book room".to_string(),
                "sub:send invites".to_string(),
            ],
        )
        .expect("apply");

        let draft = &session.draft;
        assert_eq!(draft.title, "Plan sprint");
        assert_eq!(draft.description, "two weeks");
        assert_eq!(draft.due_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert!(draft.due_time.is_some());
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.category, "Personal");
        assert_eq!(draft.recurrence, Recurrence::Weekly);
        assert_eq!(draft.subtasks.len(), 2);
    }

    #[test]
    fn draft_args_reject_bad_values() {
        let mut session = session();
        assert!(apply_draft_args(&mut session, &["due:soon".to_string()]).is_err());
        assert!(apply_draft_args(&mut session, &["time:9am".to_string()]).is_err());
        assert!(apply_draft_args(&mut session, &["priority:urgent".to_string()]).is_err());
        assert!(apply_draft_args(&mut session, &["recur:monthly".to_string()]).is_err());
    }

    #[test]
    fn bare_words_do_not_clobber_an_edited_title() {
        let mut session = session();
        session.draft.title = "Existing".to_string();
        apply_draft_args(&mut session, &["desc:changed".to_string()]).expect("apply");
        assert_eq!(session.draft.title, "Existing");
    }

    #[test]
    fn display_ids_resolve_to_uuids() {
        let temp = tempdir().expect("tempdir");
        let mut store = TaskStore::open(temp.path()).expect("open");

        let mut session = session();
        session.draft.title = "One".to_string();
        session.draft.description = "d".to_string();
        session.draft.due_date = NaiveDate::from_ymd_opt(2024, 1, 10);
        session.commit(&mut store).expect("commit");

        let uuid = resolve_display_arg(&store, "1").expect("resolve");
        assert_eq!(store.get(uuid).expect("get").title, "One");

        assert!(resolve_display_arg(&store, "2").is_err());
        assert!(resolve_display_arg(&store, "one").is_err());
    }
}
