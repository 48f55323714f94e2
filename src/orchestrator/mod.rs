//! Pipeline orchestration.
//!
//! Drives one job from pending through parse, script, slides, audio, and
//! composition to a terminal state, persisting a monotonic progress
//! checkpoint and any newly produced artifacts after every stage. A stage
//! failure is caught at the run boundary and recorded on the job; nothing
//! escapes `run` except the returned diagnostic.

use crate::config::Config;
use crate::stages::{StageSet, Synthesis};
use anyhow::{Context, Result};
use slidecast_av::ClipSource;
use slidecast_common::{paths::title_from_filename, AudioClip, AvatarOption, JobId, Slide};
use slidecast_db::models::{Job, JobStage};
use slidecast_db::pool::{get_conn, DbPool};
use slidecast_db::queries::jobs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// Progress checkpoints, in pipeline order. Monotonic within a run.
const PROGRESS_PARSING: i64 = 5;
const PROGRESS_PARSED: i64 = 15;
const PROGRESS_SCRIPT: i64 = 20;
const PROGRESS_SCRIPT_DONE: i64 = 35;
const PROGRESS_SLIDES: i64 = 40;
const PROGRESS_SLIDES_DONE: i64 = 55;
const PROGRESS_AUDIO: i64 = 60;
const PROGRESS_AUDIO_DONE: i64 = 75;
const PROGRESS_COMPOSE: i64 = 80;
const PROGRESS_OVERLAY: i64 = 90;

/// Result of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub video_path: PathBuf,
    pub duration_secs: f64,
    pub slide_count: usize,
}

/// Drives jobs through the pipeline.
pub struct Orchestrator {
    pool: DbPool,
    config: Arc<Config>,
    stages: StageSet,
}

impl Orchestrator {
    pub fn new(pool: DbPool, config: Arc<Config>, stages: StageSet) -> Self {
        Self {
            pool,
            config,
            stages,
        }
    }

    /// Execute the full pipeline for one pending job.
    ///
    /// The `pending -> parsing` store update is the entry gate: if the job
    /// is in any other stage (including being run by someone else), the
    /// gate rejects and nothing is touched. Failures after the gate are
    /// persisted as the job's terminal FAILED state and returned.
    pub async fn run(&self, job_id: JobId) -> Result<RunOutcome> {
        let job = {
            let conn = get_conn(&self.pool)?;
            jobs::get_job(&conn, job_id)?
        };

        {
            let conn = get_conn(&self.pool)?;
            jobs::advance_stage(
                &conn,
                job_id,
                JobStage::Parsing,
                PROGRESS_PARSING,
                "Parsing document",
            )?;
        }

        match self.execute(&job).await {
            Ok(outcome) => {
                info!(
                    "Job {} completed: {} ({:.1}s, {} slides)",
                    job_id,
                    outcome.video_path.display(),
                    outcome.duration_secs,
                    outcome.slide_count
                );
                Ok(outcome)
            }
            Err(e) => {
                let diagnostic = format!("{:#}", e);
                error!("Job {} failed: {}", job_id, diagnostic);
                match get_conn(&self.pool) {
                    Ok(conn) => {
                        if let Err(f) = jobs::fail_job(&conn, job_id, &diagnostic) {
                            error!("Job {}: could not record failure: {}", job_id, f);
                        }
                    }
                    Err(f) => error!("Job {}: could not record failure: {}", job_id, f),
                }
                Err(e)
            }
        }
    }

    /// Reset a failed or stuck job to pending for another run. Rejected
    /// when the job is completed or already pending.
    pub fn retry(&self, job_id: JobId) -> slidecast_common::Result<()> {
        let conn = get_conn(&self.pool)?;
        jobs::reset_for_retry(&conn, job_id)
    }

    async fn execute(&self, job: &Job) -> Result<RunOutcome> {
        let job_dir = self.config.storage.output_dir.join(job.id.to_string());
        std::fs::create_dir_all(&job_dir)
            .with_context(|| format!("Failed to create job directory {:?}", job_dir))?;

        let title = title_from_filename(Path::new(&job.original_filename));

        // Stage 1: parse (stage already advanced by the entry gate)
        let doc = self
            .stages
            .parser
            .parse(
                Path::new(&job.input_path),
                job.input_kind,
                &job_dir.join("parsed"),
            )
            .await
            .context("Failed to parse document")?;

        let figures: Vec<String> = doc
            .figures
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        {
            let conn = get_conn(&self.pool)?;
            jobs::store_parsed(
                &conn,
                job.id,
                &doc.text,
                &doc.sections,
                &figures,
                PROGRESS_PARSED,
                "Document parsed successfully",
            )?;
        }

        // Stage 2: slide script
        {
            let conn = get_conn(&self.pool)?;
            jobs::advance_stage(
                &conn,
                job.id,
                JobStage::GeneratingScript,
                PROGRESS_SCRIPT,
                "Generating presentation script",
            )?;
        }

        let mut slides = self
            .stages
            .script
            .generate(&doc, job.style, &title)
            .await
            .context("Failed to generate slide script")?;

        if slides.is_empty() {
            warn!("Job {}: script generator returned no slides, using skeleton", job.id);
            slides = crate::stages::script::fallback_skeleton(&title);
        }
        normalize_script(&mut slides);

        {
            let conn = get_conn(&self.pool)?;
            jobs::store_script(
                &conn,
                job.id,
                &slides,
                PROGRESS_SCRIPT_DONE,
                &format!("Generated {} slides", slides.len()),
            )?;
        }

        // Stage 3: slide images
        {
            let conn = get_conn(&self.pool)?;
            jobs::advance_stage(
                &conn,
                job.id,
                JobStage::GeneratingSlides,
                PROGRESS_SLIDES,
                "Creating slide images",
            )?;
        }

        let images = self
            .stages
            .renderer
            .render(&slides, &job_dir.join("slides"))
            .await
            .context("Failed to render slide images")?;

        if images.len() != slides.len() {
            anyhow::bail!(
                "slide renderer returned {} images for {} slides",
                images.len(),
                slides.len()
            );
        }

        let image_strings: Vec<String> = images
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        {
            let conn = get_conn(&self.pool)?;
            jobs::store_slide_images(
                &conn,
                job.id,
                &image_strings,
                PROGRESS_SLIDES_DONE,
                &format!("Created {} slide images", images.len()),
            )?;
        }

        // Stage 4: narration audio
        {
            let conn = get_conn(&self.pool)?;
            jobs::advance_stage(
                &conn,
                job.id,
                JobStage::GeneratingAudio,
                PROGRESS_AUDIO,
                "Generating voiceover",
            )?;
        }

        let audio_dir = job_dir.join("audio");
        let clips = self.synthesize_narration(job, &slides, &title, &audio_dir).await;

        {
            let conn = get_conn(&self.pool)?;
            jobs::store_audio(
                &conn,
                job.id,
                &audio_dir.to_string_lossy(),
                PROGRESS_AUDIO_DONE,
                &format!("Voiceover generated ({} clips)", clips.len()),
            )?;
        }

        // Stage 5: composition
        {
            let conn = get_conn(&self.pool)?;
            jobs::advance_stage(
                &conn,
                job.id,
                JobStage::ComposingVideo,
                PROGRESS_COMPOSE,
                "Composing video",
            )?;
        }

        let clip_sources: Vec<ClipSource> = clips
            .iter()
            .map(|c| ClipSource {
                slide_number: c.slide_number,
                path: c.path.clone(),
                estimated_duration_secs: Some(c.duration_secs),
            })
            .collect();

        let video_path = job_dir.join("presentation.mp4");
        let show = self
            .stages
            .composer
            .compose_slideshow(&images, &clip_sources, &video_path)
            .await
            .context("Failed to compose video")?;

        // Stage 6: avatar overlay, never fatal
        let final_path = if job.avatar != AvatarOption::None {
            {
                let conn = get_conn(&self.pool)?;
                jobs::update_progress(&conn, job.id, PROGRESS_OVERLAY, "Adding avatar overlay")?;
            }
            self.try_overlay(job, &job_dir, &show.path, show.duration_secs)
                .await
        } else {
            show.path.clone()
        };

        let message = if show.segment_count == images.len() {
            "Video generation complete".to_string()
        } else {
            format!(
                "Video generation complete ({} of {} slides composed)",
                show.segment_count,
                images.len()
            )
        };
        {
            let conn = get_conn(&self.pool)?;
            jobs::complete_job(
                &conn,
                job.id,
                &final_path.to_string_lossy(),
                show.duration_secs.round() as i64,
                &message,
            )?;
        }

        Ok(RunOutcome {
            video_path: final_path,
            duration_secs: show.duration_secs,
            slide_count: show.segment_count,
        })
    }

    /// Synthesize narration per slide. Individual failures are tolerated;
    /// if nothing at all is usable, one welcome clip keyed to slide 1 is
    /// synthesized so composition receives at least one audio-backed
    /// segment.
    async fn synthesize_narration(
        &self,
        job: &Job,
        slides: &[Slide],
        title: &str,
        audio_dir: &Path,
    ) -> Vec<AudioClip> {
        let mut clips = Vec::new();

        for slide in slides {
            let output = audio_dir.join(format!("slide_{:02}.mp3", slide.number));
            match self
                .stages
                .tts
                .synthesize(slide.number, &slide.narration, &output)
                .await
            {
                Ok(Synthesis::Clip(clip)) => clips.push(clip),
                Ok(Synthesis::Skipped) => {
                    debug!("Job {}: slide {} narration too short, skipped", job.id, slide.number);
                }
                Err(e) => {
                    warn!("Job {}: slide {} voiceover failed: {:#}", job.id, slide.number, e);
                }
            }
        }

        if clips.is_empty() && !slides.is_empty() {
            info!("Job {}: no slide narration usable, synthesizing welcome clip", job.id);
            let intro = audio_dir.join("intro.mp3");
            let text = format!("Welcome to this presentation about {}.", title);
            match self.stages.tts.synthesize(1, &text, &intro).await {
                Ok(Synthesis::Clip(clip)) => clips.push(clip),
                Ok(Synthesis::Skipped) => {
                    warn!("Job {}: welcome clip skipped as too short", job.id)
                }
                Err(e) => warn!("Job {}: welcome clip failed: {:#}", job.id, e),
            }
        }

        clips
    }

    /// Render and composite the avatar; on any failure the plain video is
    /// kept and the job still completes.
    async fn try_overlay(
        &self,
        job: &Job,
        job_dir: &Path,
        main_video: &Path,
        duration_secs: f64,
    ) -> PathBuf {
        let avatar_video = job_dir.join("avatar.mp4");
        let overlaid = job_dir.join("presentation_with_avatar.mp4");

        let rendered = match self
            .stages
            .avatar
            .render(job.avatar, duration_secs, &avatar_video)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!("Job {}: avatar rendering failed, keeping plain video: {:#}", job.id, e);
                return main_video.to_path_buf();
            }
        };

        match self
            .stages
            .composer
            .overlay_avatar(main_video, &rendered, &overlaid)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!("Job {}: avatar overlay failed, keeping plain video: {:#}", job.id, e);
                main_video.to_path_buf()
            }
        }
    }
}

/// Enforce the script invariants before it is persisted: slides are
/// numbered 1..N in presentation order, and every narration is non-empty
/// (backfilled from title and bullets when a generator leaves it blank).
fn normalize_script(slides: &mut [Slide]) {
    for (i, slide) in slides.iter_mut().enumerate() {
        slide.number = (i + 1) as u32;
        if slide.narration.trim().is_empty() {
            let bullet_text = slide
                .bullets
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            slide.narration = format!("This slide covers {}. {}", slide.title, bullet_text)
                .trim()
                .to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(number: u32, narration: &str) -> Slide {
        Slide {
            number,
            title: "The Results".into(),
            bullets: vec!["first point".into(), "second point".into()],
            narration: narration.into(),
            notes: None,
            visual_hint: None,
        }
    }

    #[test]
    fn test_normalize_renumbers_in_order() {
        let mut slides = vec![slide(7, "a"), slide(2, "b"), slide(2, "c")];
        normalize_script(&mut slides);
        let numbers: Vec<u32> = slides.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_normalize_backfills_empty_narration() {
        let mut slides = vec![slide(1, "  ")];
        normalize_script(&mut slides);
        assert_eq!(
            slides[0].narration,
            "This slide covers The Results. first point second point"
        );
    }

    #[test]
    fn test_normalize_keeps_existing_narration() {
        let mut slides = vec![slide(1, "Original narration.")];
        normalize_script(&mut slides);
        assert_eq!(slides[0].narration, "Original narration.");
    }
}
