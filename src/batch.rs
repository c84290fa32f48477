use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::{seq::IndexedRandom, Rng};
use tokio::{sync::{Mutex, Semaphore}, task::JoinSet};

use crate::client::GenerationClient;
use crate::error::Result;
use crate::io::{list_images, load_texts};
use crate::prompts::{EnhancementLevel, BATCH_TARGET_AREAS};
use crate::rate_limit::SimpleRateLimiter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Object { object_image: PathBuf },
    Text { text: String, target_area: &'static str },
}

/// One planned insertion. Lives only for the duration of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub scene: PathBuf,
    pub kind: JobKind,
    pub variation: u32,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub objects_dir: Option<PathBuf>,
    pub texts_file: Option<PathBuf>,
    pub num_variations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct BatchParams {
    pub concurrency: usize,
    pub rate_per_min: u32,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self { concurrency: 1, rate_per_min: 0 }
    }
}

fn output_name(scene: &Path, tag: &str, variation: u32) -> String {
    let stem = scene.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    match scene.extension() {
        Some(ext) => format!("{stem}_{tag}_{variation}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{tag}_{variation}"),
    }
}

/// Per scene and variation: a fair coin picks object insertion when objects exist,
/// otherwise text insertion when texts exist. Neither available means no job.
pub fn plan_batch<R: Rng>(
    scenes: &[PathBuf],
    objects: &[PathBuf],
    texts: &[String],
    num_variations: u32,
    output_dir: &Path,
    rng: &mut R,
) -> Vec<BatchJob> {
    let mut jobs = Vec::new();
    for scene in scenes {
        for variation in 0..num_variations {
            if !objects.is_empty() && rng.random_bool(0.5) {
                if let Some(object_image) = objects.choose(rng) {
                    jobs.push(BatchJob {
                        scene: scene.clone(),
                        kind: JobKind::Object { object_image: object_image.clone() },
                        variation,
                        output: output_dir.join(output_name(scene, "obj", variation)),
                    });
                }
            } else if let Some(text) = texts.choose(rng) {
                let target_area = BATCH_TARGET_AREAS.choose(rng).copied().unwrap_or("shirt");
                jobs.push(BatchJob {
                    scene: scene.clone(),
                    kind: JobKind::Text { text: text.clone(), target_area },
                    variation,
                    output: output_dir.join(output_name(scene, "text", variation)),
                });
            }
        }
    }
    jobs
}

async fn run_job(client: &GenerationClient, job: &BatchJob) -> Result<PathBuf> {
    match &job.kind {
        JobKind::Object { object_image } => {
            client
                .insert_object(&job.scene, object_image, &job.output, None, EnhancementLevel::default())
                .await
        }
        JobKind::Text { text, target_area } => {
            client.insert_text(&job.scene, text, &job.output, target_area, None).await
        }
    }
}

/// Runs every planned job, at most `params.concurrency` at a time.
/// Failed jobs are logged and skipped; the result lists successes in completion order.
pub async fn run_jobs(client: &GenerationClient, jobs: Vec<BatchJob>, params: BatchParams) -> Vec<PathBuf> {
    let sem = Arc::new(Semaphore::new(params.concurrency.max(1)));
    let limiter = Arc::new(SimpleRateLimiter::per_minute(params.rate_per_min));
    let done = Arc::new(Mutex::new(Vec::with_capacity(jobs.len())));
    let mut joinset = JoinSet::new();

    let scene_total = {
        let mut scenes: Vec<&PathBuf> = jobs.iter().map(|j| &j.scene).collect();
        scenes.dedup();
        scenes.len()
    };
    let mut scene_idx = 0usize;
    let mut last_scene: Option<PathBuf> = None;

    for job in jobs {
        if last_scene.as_ref() != Some(&job.scene) {
            scene_idx += 1;
            let name = job.scene.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            tracing::info!("Processing {name} ({scene_idx}/{scene_total})");
            last_scene = Some(job.scene.clone());
        }

        let Ok(permit) = sem.clone().acquire_owned().await else { break };
        let client = client.clone();
        let limiter = limiter.clone();
        let done = done.clone();

        joinset.spawn(async move {
            let _permit = permit;
            if let Some(l) = limiter.as_ref() {
                l.wait().await;
            }
            match run_job(&client, &job).await {
                Ok(path) => done.lock().await.push(path),
                Err(e) => {
                    let name = job.scene.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    tracing::error!("Failed to process {name} variation {}: {e}", job.variation);
                }
            }
        });
    }

    while let Some(res) = joinset.join_next().await {
        if let Err(e) = res {
            tracing::error!("batch task aborted: {e}");
        }
    }

    let mut done = done.lock().await;
    std::mem::take(&mut *done)
}

/// Enumerates inputs, plans with `rng`, and runs the plan. Only setup errors
/// (missing directories or texts file) fail the call as a whole.
pub async fn batch_process<R: Rng>(
    client: &GenerationClient,
    inputs: &BatchInputs,
    params: BatchParams,
    rng: &mut R,
) -> Result<Vec<PathBuf>> {
    let scenes = list_images(&inputs.input_dir).await?;
    let objects = match &inputs.objects_dir {
        Some(dir) => list_images(dir).await?,
        None => Vec::new(),
    };
    let texts = match &inputs.texts_file {
        Some(file) => load_texts(file).await?,
        None => Vec::new(),
    };
    tracing::info!(
        scenes = scenes.len(),
        objects = objects.len(),
        texts = texts.len(),
        variations = inputs.num_variations,
        "starting batch"
    );

    let jobs = plan_batch(&scenes, &objects, &texts, inputs.num_variations, &inputs.output_dir, rng);
    let planned = jobs.len();
    let generated = run_jobs(client, jobs, params).await;

    tracing::info!("Batch processing completed. Generated {} images ({} planned)", generated.len(), planned);
    Ok(generated)
}
