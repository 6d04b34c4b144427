use anyhow::Result;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument};

use crate::pipeline::{PipelineOptions, TranslationPipeline};
use crate::tokenizer::SubwordTokenizer;
use crate::TranslatorRunnerTrait;

/// The commands our dedicated thread can handle
pub enum TranslatorCommand {
    LoadModel {
        reply: oneshot::Sender<Result<()>>,
    },
    Translate {
        sentences: Vec<String>,
        options: PipelineOptions,
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
}

/// An actor handle you can clone to send commands from async code.
#[derive(Clone)]
pub struct TranslatorActorHandle {
    cmd_tx: Sender<TranslatorCommand>,
}

impl TranslatorActorHandle {
    pub fn new(cmd_tx: Sender<TranslatorCommand>) -> Self {
        Self { cmd_tx }
    }

    #[instrument(skip(self))]
    pub async fn load_model(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(TranslatorCommand::LoadModel { reply: reply_tx })
            .map_err(|_| anyhow::anyhow!("Actor thread closed"))?;
        reply_rx.await.map_err(|_| anyhow::anyhow!("Actor dropped reply"))?
    }

    #[instrument(skip_all, fields(sentences = sentences.len()))]
    pub async fn translate(
        &self,
        sentences: Vec<String>,
        options: PipelineOptions,
    ) -> Result<Vec<String>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(TranslatorCommand::Translate {
                sentences,
                options,
                reply: reply_tx,
            })
            .map_err(|_| anyhow::anyhow!("Actor thread closed"))?;
        reply_rx.await.map_err(|_| anyhow::anyhow!("Actor dropped reply"))?
    }
}

/// Start a dedicated thread that owns one pipeline. `build` runs on that
/// thread, so neither the runner nor the tokenizer has to be `Send`.
pub fn start_translator_actor<R, T, F>(build: F) -> (TranslatorActorHandle, thread::JoinHandle<()>)
where
    R: TranslatorRunnerTrait + 'static,
    T: SubwordTokenizer + 'static,
    F: FnOnce() -> TranslationPipeline<R, T> + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = TranslatorActorHandle::new(cmd_tx);

    let join_handle = thread::spawn(move || {
        let mut pipeline = build();
        actor_loop(&mut pipeline, cmd_rx);
        debug!("Translator actor: command channel closed, exiting.");
    });

    (handle, join_handle)
}

fn actor_loop<R, T>(pipeline: &mut TranslationPipeline<R, T>, cmd_rx: Receiver<TranslatorCommand>)
where
    R: TranslatorRunnerTrait,
    T: SubwordTokenizer,
{
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            TranslatorCommand::LoadModel { reply } => {
                if pipeline.is_loaded() {
                    info!("Model already loaded; skipping load.");
                    let _ = reply.send(Ok(()));
                } else {
                    let res = pipeline.load();
                    if let Err(e) = &res {
                        error!("Load model error: {:?}", e);
                    }
                    let _ = reply.send(res);
                }
            }
            TranslatorCommand::Translate {
                sentences,
                options,
                reply,
            } => {
                debug!("Translating {} sentences", sentences.len());
                let res = pipeline.translate(&sentences, &options);
                let _ = reply.send(res);
            }
        }
    }
}
