//! Job query operations.
//!
//! Every mutation below is one UPDATE whose `WHERE stage IN (...)` guard is
//! generated from [`JobStage::predecessors`], so progress, status message,
//! and the artifacts a stage produced become visible together, and a reader
//! can never observe a stage's progress paired with a previous stage's
//! artifact set. Zero affected rows means the transition was not legal from
//! the job's current stage and surfaces as a precondition error.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use slidecast_common::{
    AvatarOption, Error, InputKind, JobId, Result, Section, Slide, StylePreset,
};
use uuid::Uuid;

use crate::models::{Job, JobStage};

const JOB_COLUMNS: &str = "id, original_filename, input_path, input_kind, style, avatar, stage,
    progress, status_message, error_message, extracted_text, sections, figures,
    slide_script, slide_images, audio_path, video_path, video_duration_secs,
    created_at, updated_at, completed_at";

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_json<T: serde::de::DeserializeOwned>(value: Option<String>) -> Option<T> {
    value.and_then(|s| serde_json::from_str(&s).ok())
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: JobId::from(
            Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_else(|_| Uuid::nil()),
        ),
        original_filename: row.get(1)?,
        input_path: row.get(2)?,
        input_kind: row
            .get::<_, String>(3)?
            .parse()
            .unwrap_or(InputKind::Document),
        style: row
            .get::<_, String>(4)?
            .parse()
            .unwrap_or(StylePreset::Concise),
        avatar: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(AvatarOption::None),
        stage: row.get::<_, String>(6)?.parse().unwrap_or(JobStage::Pending),
        progress: row.get(7)?,
        status_message: row.get(8)?,
        error_message: row.get(9)?,
        extracted_text: row.get(10)?,
        sections: parse_json(row.get(11)?),
        figures: parse_json(row.get(12)?),
        slide_script: parse_json(row.get(13)?),
        slide_images: parse_json(row.get(14)?),
        audio_path: row.get(15)?,
        video_path: row.get(16)?,
        video_duration_secs: row.get(17)?,
        created_at: parse_timestamp(row.get(18)?).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(row.get(19)?).unwrap_or_else(Utc::now),
        completed_at: parse_timestamp(row.get(20)?),
    })
}

/// SQL `IN` list of the stages from which `to` may be entered.
fn guard_list(to: JobStage) -> String {
    JobStage::predecessors(to)
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::internal(format!("JSON encode: {}", e)))
}

/// Create a new job in the pending stage.
pub fn create_job(
    conn: &Connection,
    original_filename: &str,
    input_path: &str,
    input_kind: InputKind,
    style: StylePreset,
    avatar: AvatarOption,
) -> Result<Job> {
    let id = JobId::new();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO jobs (id, original_filename, input_path, input_kind, style, avatar,
                           stage, progress, status_message, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id.to_string(),
            original_filename,
            input_path,
            input_kind.to_string(),
            style.to_string(),
            avatar.to_string(),
            JobStage::Pending.to_string(),
            0i64,
            "Job created, waiting to start",
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    get_job(conn, id)
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Job> {
    conn.query_row(
        &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
        [id.to_string()],
        job_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("job {}", id)),
        _ => Error::database(e.to_string()),
    })
}

/// List jobs, newest first.
pub fn list_jobs(conn: &Connection, limit: usize) -> Result<Vec<Job>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC LIMIT ?",
            JOB_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let jobs = stmt
        .query_map(params![limit as i64], job_from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(jobs)
}

/// List jobs in a given stage, oldest first.
pub fn list_jobs_by_stage(conn: &Connection, stage: JobStage, limit: usize) -> Result<Vec<Job>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM jobs WHERE stage = ? ORDER BY created_at ASC LIMIT ?",
            JOB_COLUMNS
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let jobs = stmt
        .query_map(params![stage.to_string(), limit as i64], job_from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(jobs)
}

/// Get the oldest pending job (FIFO), if any.
pub fn next_pending_job(conn: &Connection) -> Result<Option<Job>> {
    let jobs = list_jobs_by_stage(conn, JobStage::Pending, 1)?;
    Ok(jobs.into_iter().next())
}

/// Advance a job to `stage`, publishing the new progress and status message.
///
/// The `Pending -> Parsing` advance doubles as the run entry gate: a second
/// concurrent run of the same job loses the UPDATE race and gets a
/// precondition error.
pub fn advance_stage(
    conn: &Connection,
    id: JobId,
    stage: JobStage,
    progress: i64,
    message: &str,
) -> Result<()> {
    let affected = conn
        .execute(
            &format!(
                "UPDATE jobs SET stage = ?, progress = ?, status_message = ?, updated_at = ?
                 WHERE id = ? AND stage IN ({})",
                guard_list(stage)
            ),
            params![
                stage.to_string(),
                progress,
                message,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(stage_precondition_error(conn, id, stage));
    }

    Ok(())
}

/// Bump progress and status message within the job's current stage.
pub fn update_progress(conn: &Connection, id: JobId, progress: i64, message: &str) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE jobs SET progress = ?, status_message = ?, updated_at = ?
             WHERE id = ? AND stage NOT IN ('completed', 'failed')",
            params![progress, message, Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::precondition(format!(
            "job {} is terminal; progress update rejected",
            id
        )));
    }

    Ok(())
}

/// Publish the parser stage's artifacts together with its progress checkpoint.
///
/// Stored text is truncated to 50 000 characters.
pub fn store_parsed(
    conn: &Connection,
    id: JobId,
    text: &str,
    sections: &[Section],
    figures: &[String],
    progress: i64,
    message: &str,
) -> Result<()> {
    let stored_text: String = text.chars().take(50_000).collect();

    let affected = conn
        .execute(
            "UPDATE jobs SET extracted_text = ?, sections = ?, figures = ?,
                             progress = ?, status_message = ?, updated_at = ?
             WHERE id = ? AND stage = 'parsing'",
            params![
                stored_text,
                to_json(&sections)?,
                to_json(&figures)?,
                progress,
                message,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::precondition(format!(
            "job {} is not in the parsing stage",
            id
        )));
    }

    Ok(())
}

/// Publish the slide script together with its progress checkpoint.
pub fn store_script(
    conn: &Connection,
    id: JobId,
    script: &[Slide],
    progress: i64,
    message: &str,
) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE jobs SET slide_script = ?, progress = ?, status_message = ?, updated_at = ?
             WHERE id = ? AND stage = 'generating_script'",
            params![
                to_json(&script)?,
                progress,
                message,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::precondition(format!(
            "job {} is not in the script stage",
            id
        )));
    }

    Ok(())
}

/// Publish the rendered slide image list together with its progress checkpoint.
pub fn store_slide_images(
    conn: &Connection,
    id: JobId,
    images: &[String],
    progress: i64,
    message: &str,
) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE jobs SET slide_images = ?, progress = ?, status_message = ?, updated_at = ?
             WHERE id = ? AND stage = 'generating_slides'",
            params![
                to_json(&images)?,
                progress,
                message,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::precondition(format!(
            "job {} is not in the slide rendering stage",
            id
        )));
    }

    Ok(())
}

/// Publish the narration audio directory together with its progress checkpoint.
pub fn store_audio(
    conn: &Connection,
    id: JobId,
    audio_path: &str,
    progress: i64,
    message: &str,
) -> Result<()> {
    let affected = conn
        .execute(
            "UPDATE jobs SET audio_path = ?, progress = ?, status_message = ?, updated_at = ?
             WHERE id = ? AND stage = 'generating_audio'",
            params![
                audio_path,
                progress,
                message,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::precondition(format!(
            "job {} is not in the audio stage",
            id
        )));
    }

    Ok(())
}

/// Complete a job with its final video.
pub fn complete_job(
    conn: &Connection,
    id: JobId,
    video_path: &str,
    duration_secs: i64,
    message: &str,
) -> Result<()> {
    let now = Utc::now();
    let affected = conn
        .execute(
            &format!(
                "UPDATE jobs SET stage = 'completed', progress = 100, status_message = ?,
                                 video_path = ?, video_duration_secs = ?,
                                 updated_at = ?, completed_at = ?
                 WHERE id = ? AND stage IN ({})",
                guard_list(JobStage::Completed)
            ),
            params![
                message,
                video_path,
                duration_secs,
                now.to_rfc3339(),
                now.to_rfc3339(),
                id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(stage_precondition_error(conn, id, JobStage::Completed));
    }

    Ok(())
}

/// Fail a job with a diagnostic message, zeroing progress.
pub fn fail_job(conn: &Connection, id: JobId, error_message: &str) -> Result<()> {
    let affected = conn
        .execute(
            &format!(
                "UPDATE jobs SET stage = 'failed', progress = 0, status_message = 'Job failed',
                                 error_message = ?, updated_at = ?
                 WHERE id = ? AND stage IN ({})",
                guard_list(JobStage::Failed)
            ),
            params![error_message, Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(stage_precondition_error(conn, id, JobStage::Failed));
    }

    Ok(())
}

/// Reset a failed or stuck job to pending for another run.
///
/// Clears the error message, zeroes progress, and drops any stale
/// completion timestamp. Rejected when the job is completed or already
/// pending.
pub fn reset_for_retry(conn: &Connection, id: JobId) -> Result<()> {
    let affected = conn
        .execute(
            &format!(
                "UPDATE jobs SET stage = 'pending', progress = 0, error_message = NULL,
                                 status_message = 'Queued for retry', completed_at = NULL,
                                 updated_at = ?
                 WHERE id = ? AND stage IN ({})",
                guard_list(JobStage::Pending)
            ),
            params![Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(stage_precondition_error(conn, id, JobStage::Pending));
    }

    Ok(())
}

/// Reset jobs stranded mid-stage by a previous process back to pending.
/// Returns the number of jobs recovered.
pub fn reset_orphaned_jobs(conn: &Connection) -> Result<usize> {
    let affected = conn
        .execute(
            "UPDATE jobs SET stage = 'pending', progress = 0, error_message = NULL,
                             status_message = 'Recovered after restart', updated_at = ?
             WHERE stage NOT IN ('pending', 'completed', 'failed')",
            params![Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(affected)
}

/// Delete a job record. Artifact directories are the caller's to remove.
pub fn delete_job(conn: &Connection, id: JobId) -> Result<()> {
    let affected = conn
        .execute("DELETE FROM jobs WHERE id = ?", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;

    if affected == 0 {
        return Err(Error::not_found(format!("job {}", id)));
    }

    Ok(())
}

/// Build the error for a guarded UPDATE that touched zero rows: either the
/// job does not exist, or its current stage forbids the transition.
fn stage_precondition_error(conn: &Connection, id: JobId, to: JobStage) -> Error {
    match get_job(conn, id) {
        Ok(job) => Error::precondition(format!(
            "job {} cannot move from {} to {}",
            id, job.stage, to
        )),
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{init_memory_pool, PooledConnection};

    fn setup_test_db() -> PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    fn create_test_job(conn: &Connection) -> Job {
        create_job(
            conn,
            "paper.pdf",
            "/uploads/paper.pdf",
            InputKind::Document,
            StylePreset::Concise,
            AvatarOption::SimpleGraphic,
        )
        .unwrap()
    }

    fn sample_slides() -> Vec<Slide> {
        vec![Slide {
            number: 1,
            title: "Introduction".into(),
            bullets: vec!["Point one".into()],
            narration: "Welcome.".into(),
            notes: None,
            visual_hint: None,
        }]
    }

    #[test]
    fn test_create_job() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        assert_eq!(job.stage, JobStage::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.original_filename, "paper.pdf");
        assert_eq!(job.avatar, AvatarOption::SimpleGraphic);
        assert!(job.error_message.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_get_job_not_found() {
        let conn = setup_test_db();
        let result = get_job(&conn, JobId::new());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_full_lifecycle() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);
        let id = job.id;

        advance_stage(&conn, id, JobStage::Parsing, 5, "Parsing document").unwrap();
        store_parsed(&conn, id, "full text", &[], &[], 15, "Document parsed").unwrap();

        advance_stage(&conn, id, JobStage::GeneratingScript, 20, "Generating script").unwrap();
        store_script(&conn, id, &sample_slides(), 35, "Generated 1 slide").unwrap();

        advance_stage(&conn, id, JobStage::GeneratingSlides, 40, "Rendering slides").unwrap();
        store_slide_images(&conn, id, &["/out/slide_01.png".into()], 55, "Rendered").unwrap();

        advance_stage(&conn, id, JobStage::GeneratingAudio, 60, "Generating voiceover").unwrap();
        store_audio(&conn, id, "/out/audio", 75, "Voiceover generated").unwrap();

        advance_stage(&conn, id, JobStage::ComposingVideo, 80, "Composing video").unwrap();
        complete_job(&conn, id, "/out/presentation.mp4", 42, "Done").unwrap();

        let job = get_job(&conn, id).unwrap();
        assert_eq!(job.stage, JobStage::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.video_path.as_deref(), Some("/out/presentation.mp4"));
        assert_eq!(job.video_duration_secs, Some(42));
        assert_eq!(job.slide_script.as_ref().map(|s| s.len()), Some(1));
        assert_eq!(
            job.slide_images.as_deref(),
            Some(&["/out/slide_01.png".to_string()][..])
        );
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_advance_stage_rejects_skips() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        // Cannot jump straight to slide rendering from pending
        let result = advance_stage(&conn, job.id, JobStage::GeneratingSlides, 40, "nope");
        assert!(matches!(result, Err(Error::Precondition(_))));

        let job = get_job(&conn, job.id).unwrap();
        assert_eq!(job.stage, JobStage::Pending);
    }

    #[test]
    fn test_entry_gate_single_run() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        advance_stage(&conn, job.id, JobStage::Parsing, 5, "run one").unwrap();
        // A second run loses the race at the same gate
        let second = advance_stage(&conn, job.id, JobStage::Parsing, 5, "run two");
        assert!(matches!(second, Err(Error::Precondition(_))));
    }

    #[test]
    fn test_artifact_store_requires_matching_stage() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        // Job is pending, not parsing: artifact publication must be rejected
        let result = store_parsed(&conn, job.id, "text", &[], &[], 15, "parsed");
        assert!(matches!(result, Err(Error::Precondition(_))));

        let job = get_job(&conn, job.id).unwrap();
        assert!(job.extracted_text.is_none());
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_fail_job() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        advance_stage(&conn, job.id, JobStage::Parsing, 5, "Parsing").unwrap();
        fail_job(&conn, job.id, "document is unreadable").unwrap();

        let job = get_job(&conn, job.id).unwrap();
        assert_eq!(job.stage, JobStage::Failed);
        assert_eq!(job.progress, 0);
        assert_eq!(job.error_message.as_deref(), Some("document is unreadable"));
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_fail_completed_job_rejected() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);
        let id = job.id;

        advance_stage(&conn, id, JobStage::Parsing, 5, "p").unwrap();
        advance_stage(&conn, id, JobStage::GeneratingScript, 20, "s").unwrap();
        advance_stage(&conn, id, JobStage::GeneratingSlides, 40, "r").unwrap();
        advance_stage(&conn, id, JobStage::GeneratingAudio, 60, "a").unwrap();
        advance_stage(&conn, id, JobStage::ComposingVideo, 80, "c").unwrap();
        complete_job(&conn, id, "/out.mp4", 10, "Done").unwrap();

        let result = fail_job(&conn, id, "too late");
        assert!(matches!(result, Err(Error::Precondition(_))));
    }

    #[test]
    fn test_retry_failed_job() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        advance_stage(&conn, job.id, JobStage::Parsing, 5, "Parsing").unwrap();
        fail_job(&conn, job.id, "boom").unwrap();
        reset_for_retry(&conn, job.id).unwrap();

        let job = get_job(&conn, job.id).unwrap();
        assert_eq!(job.stage, JobStage::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_retry_stuck_job() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        advance_stage(&conn, job.id, JobStage::Parsing, 5, "Parsing").unwrap();
        advance_stage(&conn, job.id, JobStage::GeneratingScript, 20, "stuck here").unwrap();
        reset_for_retry(&conn, job.id).unwrap();

        let job = get_job(&conn, job.id).unwrap();
        assert_eq!(job.stage, JobStage::Pending);
    }

    #[test]
    fn test_retry_rejected_when_pending_or_completed() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);
        let id = job.id;

        // Already pending
        assert!(matches!(
            reset_for_retry(&conn, id),
            Err(Error::Precondition(_))
        ));

        advance_stage(&conn, id, JobStage::Parsing, 5, "p").unwrap();
        advance_stage(&conn, id, JobStage::GeneratingScript, 20, "s").unwrap();
        advance_stage(&conn, id, JobStage::GeneratingSlides, 40, "r").unwrap();
        advance_stage(&conn, id, JobStage::GeneratingAudio, 60, "a").unwrap();
        advance_stage(&conn, id, JobStage::ComposingVideo, 80, "c").unwrap();
        complete_job(&conn, id, "/out.mp4", 10, "Done").unwrap();

        // Completed
        assert!(matches!(
            reset_for_retry(&conn, id),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn test_reset_orphaned_jobs() {
        let conn = setup_test_db();
        let stuck = create_test_job(&conn);
        let pending = create_test_job(&conn);
        let failed = create_test_job(&conn);

        advance_stage(&conn, stuck.id, JobStage::Parsing, 5, "interrupted").unwrap();
        advance_stage(&conn, failed.id, JobStage::Parsing, 5, "p").unwrap();
        fail_job(&conn, failed.id, "boom").unwrap();

        let count = reset_orphaned_jobs(&conn).unwrap();
        assert_eq!(count, 1);

        assert_eq!(get_job(&conn, stuck.id).unwrap().stage, JobStage::Pending);
        assert_eq!(get_job(&conn, pending.id).unwrap().stage, JobStage::Pending);
        assert_eq!(get_job(&conn, failed.id).unwrap().stage, JobStage::Failed);
    }

    #[test]
    fn test_next_pending_job_fifo() {
        let conn = setup_test_db();
        assert!(next_pending_job(&conn).unwrap().is_none());

        let first = create_test_job(&conn);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let _second = create_test_job(&conn);

        let next = next_pending_job(&conn).unwrap().unwrap();
        assert_eq!(next.id, first.id);
    }

    #[test]
    fn test_text_truncated_at_store() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        advance_stage(&conn, job.id, JobStage::Parsing, 5, "Parsing").unwrap();
        let long_text = "x".repeat(60_000);
        store_parsed(&conn, job.id, &long_text, &[], &[], 15, "parsed").unwrap();

        let job = get_job(&conn, job.id).unwrap();
        assert_eq!(job.extracted_text.unwrap().len(), 50_000);
    }

    #[test]
    fn test_delete_job() {
        let conn = setup_test_db();
        let job = create_test_job(&conn);

        delete_job(&conn, job.id).unwrap();
        assert!(matches!(get_job(&conn, job.id), Err(Error::NotFound(_))));
        assert!(matches!(delete_job(&conn, job.id), Err(Error::NotFound(_))));
    }
}
