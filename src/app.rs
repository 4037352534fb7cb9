use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};
use vlmapi::{GeminiClient, ImagePart, response_text};

use crate::config::AppConfig;
use crate::constants::{API_KEY_ENV, CONFIG_FILE_NAME, IMAGE_EXTENSIONS, PREVIEW_COLUMNS};
use crate::error::{AppError, Result};
use crate::history::{self, QueryRecord};
use crate::library;
use crate::models::StagedImage;
use crate::preview;

/// What the background worker is doing, shared between the GUI thread and
/// spawned tasks. At most one task runs at a time.
enum TaskState {
    Idle,
    Staging,
    Generating,
    Staged(Result<Option<StagedBatch>>),
    Answered(Result<String>),
}

/// Result of one staging pass: the new selections plus the refreshed upload
/// folder listing.
struct StagedBatch {
    loaded: Vec<LoadedImage>,
    folder: Vec<StagedImage>,
}

/// A staged image plus its decoded preview pixels. The preview may be missing
/// when the file does not decode; the image is still sent.
struct LoadedImage {
    image: StagedImage,
    thumbnail: Option<egui::ColorImage>,
}

struct Preview {
    name: String,
    texture: egui::TextureHandle,
}

pub struct ImageQueryApp {
    config: AppConfig,
    upload_dir: PathBuf,
    query: String,
    staged: Vec<StagedImage>,
    previews: Vec<Preview>,
    folder_contents: Vec<StagedImage>,
    result_text: String,
    error_banner: Option<String>,
    history: Vec<QueryRecord>,
    task: Arc<Mutex<TaskState>>,
}

impl ImageQueryApp {
    pub fn new(
        config: AppConfig,
        history: Vec<QueryRecord>,
        folder_contents: Vec<StagedImage>,
    ) -> Self {
        let upload_dir = PathBuf::from(&config.upload_dir);
        Self {
            config,
            upload_dir,
            query: String::new(),
            staged: Vec::new(),
            previews: Vec::new(),
            folder_contents,
            result_text: String::new(),
            error_banner: None,
            history,
            task: Arc::new(Mutex::new(TaskState::Idle)),
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            *self.task.lock().unwrap(),
            TaskState::Staging | TaskState::Generating
        )
    }

    fn is_generating(&self) -> bool {
        matches!(*self.task.lock().unwrap(), TaskState::Generating)
    }

    /// Fold a finished background task into the GUI state. Runs at the top of
    /// every frame.
    fn poll_task(&mut self, ctx: &egui::Context) {
        let finished = {
            let mut task = self.task.lock().unwrap();
            if matches!(*task, TaskState::Staged(_) | TaskState::Answered(_)) {
                mem::replace(&mut *task, TaskState::Idle)
            } else {
                return;
            }
        };

        match finished {
            TaskState::Staged(Ok(Some(batch))) => {
                let names: Vec<&str> = batch
                    .loaded
                    .iter()
                    .map(|loaded| loaded.image.name.as_str())
                    .collect();
                info!("Uploaded {} image(s): {}", names.len(), names.join(", "));

                self.previews.clear();
                self.staged.clear();
                for LoadedImage { image, thumbnail } in batch.loaded {
                    if let Some(thumb) = thumbnail {
                        let texture =
                            ctx.load_texture(image.name.clone(), thumb, egui::TextureOptions::LINEAR);
                        self.previews.push(Preview {
                            name: image.name.clone(),
                            texture,
                        });
                    }
                    self.staged.push(image);
                }
                self.folder_contents = batch.folder;
                self.error_banner = None;
            }
            TaskState::Staged(Ok(None)) => {
                // Dialog cancelled; keep whatever was staged before.
            }
            TaskState::Staged(Err(err)) => {
                error!("Image staging failed: {}", err);
                self.error_banner = Some(err.to_string());
            }
            TaskState::Answered(Ok(text)) => {
                let record = QueryRecord::new(
                    self.query.trim(),
                    self.staged.iter().map(|image| image.name.clone()).collect(),
                    text.as_str(),
                );
                self.history.push(record.clone());
                let upload_dir = self.upload_dir.clone();
                tokio::spawn(async move {
                    if let Err(err) = history::append_query_record(&upload_dir, record).await {
                        warn!("Failed to append query log: {}", err);
                    }
                });
                self.result_text = text;
                self.error_banner = None;
            }
            TaskState::Answered(Err(err)) => {
                error!("Generation request failed: {}", err);
                self.error_banner = Some(err.to_string());
            }
            TaskState::Idle | TaskState::Staging | TaskState::Generating => {}
        }
    }

    /// Open the file dialog and stage the picked images, off the GUI thread.
    fn select_images(&mut self, ctx: &egui::Context) {
        if self.is_busy() {
            return;
        }
        *self.task.lock().unwrap() = TaskState::Staging;

        let task = Arc::clone(&self.task);
        let upload_dir = self.upload_dir.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let outcome = pick_and_stage(&upload_dir).await;
            *task.lock().unwrap() = TaskState::Staged(outcome);
            ctx.request_repaint();
        });
    }

    /// Validate, then send the staged images plus the query text in one
    /// generation request.
    fn submit_query(&mut self, ctx: &egui::Context) {
        if self.is_busy() {
            return;
        }
        if self.staged.is_empty() {
            self.error_banner = Some("Please select at least one image.".to_string());
            return;
        }
        let Some(api_key) = self.config.resolved_api_key() else {
            self.error_banner = Some(format!(
                "No API key configured. Set {} or add \"api_key\" to {}.",
                API_KEY_ENV, CONFIG_FILE_NAME
            ));
            return;
        };
        self.error_banner = None;

        let client = GeminiClient::with_timeout(
            api_key,
            &self.config.endpoint,
            &self.config.model,
            Duration::from_secs(self.config.timeout_secs),
        )
        .with_generation_config(self.config.generation.into());

        info!(
            "Submitting query with {} image(s) to model {}",
            self.staged.len(),
            client.model()
        );
        *self.task.lock().unwrap() = TaskState::Generating;

        let task = Arc::clone(&self.task);
        let ctx = ctx.clone();
        let query = self.query.trim().to_string();
        let staged = self.staged.clone();
        tokio::spawn(async move {
            let outcome = run_generation(&client, &query, &staged).await;
            *task.lock().unwrap() = TaskState::Answered(outcome);
            ctx.request_repaint();
        });
    }

    fn open_upload_folder(&self) {
        info!("Opening upload folder: {}", self.upload_dir.display());
        if let Err(err) = library::open_dir(&self.upload_dir) {
            warn!("Failed to open upload folder: {}", err);
        }
    }
}

impl eframe::App for ImageQueryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_task(ctx);
        let busy = self.is_busy();
        let generating = self.is_generating();

        let mut do_upload = false;
        let mut do_open_folder = false;
        let mut do_submit = false;

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!busy, egui::Button::new("Upload Images"))
                    .clicked()
                {
                    do_upload = true;
                }
                if ui.button("Open Upload Folder").clicked() {
                    do_open_folder = true;
                }
                if busy {
                    ui.spinner();
                    ui.label(if generating {
                        "Waiting for reply..."
                    } else {
                        "Copying images..."
                    });
                }
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.previews.is_empty() {
                egui::ScrollArea::vertical()
                    .id_salt("previews")
                    .max_height(240.0)
                    .show(ui, |ui| {
                        egui::Grid::new("preview_grid")
                            .spacing([10.0, 10.0])
                            .show(ui, |ui| {
                                for (index, preview) in self.previews.iter().enumerate() {
                                    ui.vertical(|ui| {
                                        ui.image(&preview.texture);
                                        ui.label(egui::RichText::new(&preview.name).small());
                                    });
                                    if (index + 1) % PREVIEW_COLUMNS == 0 {
                                        ui.end_row();
                                    }
                                }
                            });
                    });
                ui.separator();
            }

            ui.label("Enter your query:");
            let query_edit = ui.add_enabled(
                !busy,
                egui::TextEdit::singleline(&mut self.query)
                    .desired_width(f32::INFINITY)
                    .hint_text("What would you like to know about these images?"),
            );
            let submitted_with_enter =
                query_edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if submitted_with_enter
                || ui
                    .add_enabled(!busy, egui::Button::new("Submit Query"))
                    .clicked()
            {
                do_submit = true;
            }

            if let Some(message) = &self.error_banner {
                ui.add_space(4.0);
                ui.colored_label(egui::Color32::LIGHT_RED, message);
            }

            ui.separator();
            ui.label("Result:");
            egui::ScrollArea::vertical()
                .id_salt("result")
                .max_height(280.0)
                .show(ui, |ui| {
                    let mut reply = self.result_text.as_str();
                    ui.add(
                        egui::TextEdit::multiline(&mut reply)
                            .desired_width(f32::INFINITY)
                            .desired_rows(12),
                    );
                });

            if !self.folder_contents.is_empty() {
                ui.separator();
                egui::CollapsingHeader::new(format!(
                    "Upload folder ({} image(s))",
                    self.folder_contents.len()
                ))
                .show(ui, |ui| {
                    for image in &self.folder_contents {
                        ui.label(format!("{}  ({})", image.name, format_size(image.size)));
                    }
                });
            }

            if !self.history.is_empty() {
                ui.separator();
                egui::CollapsingHeader::new("Recent queries").show(ui, |ui| {
                    for record in self.history.iter().rev().take(10) {
                        let query = if record.query.is_empty() {
                            "(no query)"
                        } else {
                            record.query.as_str()
                        };
                        ui.label(format!(
                            "[{}] {} ({} image(s))",
                            format_timestamp(record.timestamp),
                            query,
                            record.images.len()
                        ));
                        ui.label(egui::RichText::new(truncate(&record.reply, 120)).weak());
                        ui.add_space(2.0);
                    }
                });
            }
        });

        if busy {
            ctx.output_mut(|output| output.cursor_icon = egui::CursorIcon::Progress);
        }

        if do_upload {
            self.select_images(ctx);
        }
        if do_open_folder {
            self.open_upload_folder();
        }
        if do_submit {
            self.submit_query(ctx);
        }
    }
}

async fn pick_and_stage(upload_dir: &Path) -> Result<Option<StagedBatch>> {
    let files = rfd::AsyncFileDialog::new()
        .set_title("Select Images")
        .add_filter("Image files", IMAGE_EXTENSIONS)
        .add_filter("All files", &["*"])
        .pick_files()
        .await;

    let Some(files) = files else {
        debug!("Image selection cancelled");
        return Ok(None);
    };

    let selection: Vec<PathBuf> = files
        .iter()
        .map(|file| file.path().to_path_buf())
        .collect();
    Ok(Some(stage_selection(upload_dir, selection).await?))
}

/// Stage a selection and decode previews. A file that fails to decode keeps
/// its place in the batch without a thumbnail.
async fn stage_selection(upload_dir: &Path, selection: Vec<PathBuf>) -> Result<StagedBatch> {
    let staged = library::stage_images(upload_dir, &selection).await?;

    let mut loaded = Vec::with_capacity(staged.len());
    for image in staged {
        let thumbnail = match preview::load_thumbnail(&image.path) {
            Ok(thumb) => Some(thumb),
            Err(err) => {
                warn!("Preview failed for '{}': {}", image.name, err);
                None
            }
        };
        loaded.push(LoadedImage { image, thumbnail });
    }

    let folder = library::collect_staged_images(upload_dir).await?;
    Ok(StagedBatch { loaded, folder })
}

/// Read every staged copy back from the upload folder and send the bundle.
async fn run_generation(
    client: &GeminiClient,
    query: &str,
    staged: &[StagedImage],
) -> Result<String> {
    let mut images = Vec::with_capacity(staged.len());
    for image in staged {
        let bytes = tokio::fs::read(&image.path).await.map_err(|err| {
            AppError::Upload(format!(
                "Failed to read staged image '{}': {}",
                image.name, err
            ))
        })?;
        images.push(ImagePart::from_bytes(bytes, Some(&image.path)));
    }

    let response = client.generate(query, &images).await?;
    let text = response_text(&response)?;
    info!("Received reply of {} characters", text.chars().count());
    Ok(text)
}

fn format_timestamp(timestamp: u64) -> String {
    chrono::DateTime::from_timestamp(timestamp as i64, 0)
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
