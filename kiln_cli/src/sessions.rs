//! Read side of the session store: listing, details, samples and notes.

use eyre::{Result, WrapErr};
use kiln_store::{KilnStore, SessionRecord};
use std::io::Write;

fn not_found(id: &str) -> eyre::Report {
    eyre::eyre!("session {id} not found")
}

fn fmt_time(t: Option<i64>) -> String {
    t.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn line(s: &SessionRecord) -> String {
    format!(
        "{}  created={}  ended={}  outcome={}  profile={}",
        s.id,
        s.created_at,
        fmt_time(s.ended_at),
        s.outcome.as_deref().unwrap_or("-"),
        s.profile_name.as_deref().unwrap_or("-"),
    )
}

pub fn list(store: &KilnStore, limit: usize, offset: usize, json: bool, out: &mut impl Write) -> Result<()> {
    let sessions = store.list_sessions(limit, offset)?;
    if json {
        writeln!(out, "{}", serde_json::to_string(&sessions)?)?;
    } else if sessions.is_empty() {
        writeln!(out, "no sessions recorded")?;
    } else {
        for s in &sessions {
            writeln!(out, "{}", line(s))?;
        }
    }
    Ok(())
}

pub fn show(store: &KilnStore, id: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let s = store.get_session(id)?.ok_or_else(|| not_found(id))?;
    if json {
        writeln!(out, "{}", serde_json::to_string(&s)?)?;
        return Ok(());
    }
    writeln!(out, "id:         {}", s.id)?;
    writeln!(out, "profile:    {}", s.profile_name.as_deref().unwrap_or("-"))?;
    writeln!(out, "outcome:    {}", s.outcome.as_deref().unwrap_or("-"))?;
    writeln!(out, "created_at: {}", s.created_at)?;
    writeln!(out, "started_at: {}", fmt_time(s.started_at))?;
    writeln!(out, "ended_at:   {}", fmt_time(s.ended_at))?;
    if let (Some(start), Some(end)) = (s.started_at, s.ended_at) {
        writeln!(out, "duration:   {}s", end - start)?;
    }
    writeln!(out, "notes:      {}", s.notes.as_deref().unwrap_or(""))?;
    Ok(())
}

/// One JSON object per line: `{"t": <unix>, "state": {...}}`.
pub fn samples(
    store: &KilnStore,
    id: &str,
    from: Option<i64>,
    to: Option<i64>,
    limit: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    if store.get_session(id)?.is_none() {
        return Err(not_found(id));
    }
    for s in store.list_session_samples(id, from, to, limit)? {
        writeln!(out, "{}", serde_json::to_string(&s)?)?;
    }
    Ok(())
}

pub fn notes(store: &KilnStore, id: &str, text: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let notes = (!text.is_empty()).then_some(text);
    let updated = store
        .update_notes(id, notes)
        .wrap_err_with(|| format!("update notes of session {id}"))?;
    if !updated {
        return Err(not_found(id));
    }
    if json {
        writeln!(out, "{}", serde_json::json!({ "id": id, "notes": notes }))?;
    } else {
        writeln!(out, "notes updated for {id}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::Outcome;

    fn store_with_session() -> (KilnStore, String) {
        let store = KilnStore::open_in_memory().expect("store");
        let id = store
            .create_session(Some("cone6"), Some(100), Some(100), Outcome::Running)
            .expect("create");
        (store, id)
    }

    fn text(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("command");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn list_prints_one_line_per_session() {
        let (store, id) = store_with_session();
        let out = text(|o| list(&store, 10, 0, false, o));
        assert!(out.contains(&id));
        assert!(out.contains("profile=cone6"));
        assert!(out.contains("outcome=RUNNING"));
    }

    #[test]
    fn empty_store_says_so() {
        let store = KilnStore::open_in_memory().expect("store");
        assert_eq!(text(|o| list(&store, 10, 0, false, o)).trim(), "no sessions recorded");
        assert_eq!(text(|o| list(&store, 10, 0, true, o)).trim(), "[]");
    }

    #[test]
    fn show_reports_duration_of_ended_sessions() {
        let (store, id) = store_with_session();
        store
            .stop_session(&id, Some(160), Outcome::Completed)
            .expect("stop");
        let out = text(|o| show(&store, &id, false, o));
        assert!(out.contains("duration:   60s"), "{out}");
    }

    #[test]
    fn unknown_ids_are_errors() {
        let store = KilnStore::open_in_memory().expect("store");
        let mut sink = Vec::new();
        assert!(show(&store, "missing", false, &mut sink).is_err());
        assert!(samples(&store, "missing", None, None, None, &mut sink).is_err());
        let err = notes(&store, "missing", "x", false, &mut sink).expect_err("unknown");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn samples_are_json_lines() {
        let (store, id) = store_with_session();
        for t in [101, 102] {
            store
                .add_session_sample(&id, &serde_json::json!({ "temperature": t }), Some(t))
                .expect("sample");
        }
        let out = text(|o| samples(&store, &id, Some(102), None, None, o));
        let rows: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["t"], 102);
        assert_eq!(rows[0]["state"]["temperature"], 102);
    }

    #[test]
    fn empty_text_clears_notes() {
        let (store, id) = store_with_session();
        text(|o| notes(&store, &id, "crawled glaze", false, o));
        text(|o| notes(&store, &id, "", false, o));
        assert!(store.get_session(&id).expect("get").expect("exists").notes.is_none());
    }
}
