use std::path::PathBuf;

use crate::{
    config::PromptConfig,
    error::{Result, TrendscopeError},
    format::join_paths,
    llm::LanguageModel,
    transcripts::read_transcripts,
    types::{Report, Stage},
};

/// Stage boundaries reported by [`ReportPipeline::run_observed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Started(Stage),
    Finished(Stage),
}

/// Two sequential model calls: transcript analysis, then report synthesis.
pub struct ReportPipeline<'a, M: LanguageModel + ?Sized> {
    model: &'a M,
    prompts: &'a PromptConfig,
}

impl<'a, M: LanguageModel + ?Sized> ReportPipeline<'a, M> {
    pub fn new(model: &'a M, prompts: &'a PromptConfig) -> Self {
        Self { model, prompts }
    }

    /// Read the transcript files and ask the analysis agent for cross-video trends
    pub async fn analyze(&self, transcript_paths: &[PathBuf]) -> Result<String> {
        let stage = self.prompts.stage(Stage::Analysis);
        let joined = join_paths(transcript_paths);
        let transcripts = read_transcripts(transcript_paths).await?;

        let mut user_prompt = stage.task.render(&[("file_paths", &joined)]);
        user_prompt.push_str("\n\n");
        if transcripts.is_empty() {
            user_prompt.push_str("No transcript files were provided.");
        } else {
            user_prompt.push_str("Transcript files:\n");
            for (path, text) in &transcripts {
                user_prompt.push_str(&format!("\n=== {} ===\n{}", path.display(), text));
            }
        }

        tracing::info!(files = transcripts.len(), "Running analysis stage");
        self.complete(Stage::Analysis, &stage.agent.system_prompt(), &user_prompt)
            .await
    }

    /// Turn the analysis into the user-facing report text
    pub async fn synthesize(&self, analysis: &str) -> Result<String> {
        let stage = self.prompts.stage(Stage::Synthesis);
        let user_prompt = format!(
            "{}\n\nThis is the context you're working with:\n{}",
            stage.task.render(&[]),
            analysis
        );

        tracing::info!("Running synthesis stage");
        self.complete(Stage::Synthesis, &stage.agent.system_prompt(), &user_prompt)
            .await
    }

    pub async fn run(&self, transcript_paths: &[PathBuf]) -> Result<Report> {
        self.run_observed(transcript_paths, |_| {}).await
    }

    /// Analysis then synthesis, reporting each stage boundary to `on_stage`.
    ///
    /// A failed stage emits no `Finished` event and the next stage never starts.
    pub async fn run_observed<F>(
        &self,
        transcript_paths: &[PathBuf],
        mut on_stage: F,
    ) -> Result<Report>
    where
        F: FnMut(StageEvent),
    {
        on_stage(StageEvent::Started(Stage::Analysis));
        let analysis = self.analyze(transcript_paths).await?;
        on_stage(StageEvent::Finished(Stage::Analysis));

        on_stage(StageEvent::Started(Stage::Synthesis));
        let text = self.synthesize(&analysis).await?;
        on_stage(StageEvent::Finished(Stage::Synthesis));

        Ok(Report { analysis, text })
    }

    async fn complete(&self, stage: Stage, system: &str, user: &str) -> Result<String> {
        let output = self
            .model
            .complete(system, user)
            .await
            .map_err(|e| TrendscopeError::pipeline(stage, e.to_string()))?;

        if output.trim().is_empty() {
            return Err(TrendscopeError::pipeline(stage, "model returned no output"));
        }
        Ok(output)
    }
}
