//! Screening workflows
//!
//! The three things a recruiter asks of the resume store: free-form analysis,
//! matching candidates against a job description, and side-by-side comparison.
//! Each one retrieves segments, renders a caller-owned prompt template with
//! them, and hands the prompt to the generation provider.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::RetrievalConfig;
use crate::error::{AssistantError, ProviderTimeout};
use crate::providers::GenerationProvider;
use crate::rag::{MetadataFilter, Retriever, Segment};

/// A validated prompt template.
///
/// Templates see `context` (retrieved segment texts separated by blank
/// lines) plus the workflow's own variable: `question`, `job_description` or
/// `criteria`. Referencing anything else is an error at render time.
pub struct PromptTemplate {
    env: Environment<'static>,
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Result<Self, AssistantError> {
        let source = source.into();

        // parse once so syntax errors show up here, not mid-workflow
        let check = Environment::new();
        check.template_from_str(&source)?;

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Ok(Self { env, source })
    }

    pub fn render<S: Serialize>(&self, ctx: S) -> Result<String, AssistantError> {
        Ok(self.env.render_str(&self.source, ctx)?)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptTemplate").field("source", &self.source).finish()
    }
}

/// Generated answer plus the segments it was grounded on.
#[derive(Debug, Clone)]
pub struct AssistantAnswer {
    pub answer: String,
    pub sources: Vec<Segment>,
}

#[derive(Serialize)]
struct AnalyzeContext<'a> {
    context: &'a str,
    question: &'a str,
}

#[derive(Serialize)]
struct MatchContext<'a> {
    context: &'a str,
    job_description: &'a str,
}

#[derive(Serialize)]
struct CompareContext<'a> {
    context: &'a str,
    criteria: &'a str,
}

pub struct ScreeningAssistant {
    generator: Arc<dyn GenerationProvider>,
    retrieval: RetrievalConfig,
    timeout: Duration,
}

impl ScreeningAssistant {
    /// `timeout` bounds each generation call.
    pub fn new(generator: Arc<dyn GenerationProvider>, retrieval: RetrievalConfig, timeout: Duration) -> Self {
        Self {
            generator,
            retrieval,
            timeout,
        }
    }

    /// Answer a free-form question about the processed resumes.
    #[instrument(skip_all)]
    pub async fn analyze(
        &self,
        retriever: &Retriever,
        template: &PromptTemplate,
        question: &str,
    ) -> Result<AssistantAnswer, AssistantError> {
        let sources = retriever.retrieve_by_query(question, self.retrieval.default_k).await?;
        let context = join_context(&sources);
        let prompt = template.render(AnalyzeContext {
            context: &context,
            question,
        })?;

        self.answer(prompt, sources).await
    }

    /// Rank candidates against a job description.
    ///
    /// When `selected` names a proper subset of `processed`, only those
    /// candidates' segments are searched. An empty selection means everyone.
    #[instrument(skip_all)]
    pub async fn match_candidates<S: AsRef<str>>(
        &self,
        retriever: &Retriever,
        template: &PromptTemplate,
        job_description: &str,
        selected: &[S],
        processed: &[S],
    ) -> Result<AssistantAnswer, AssistantError> {
        let selected = distinct_ids(selected);
        let restrict = !selected.is_empty()
            && processed
                .iter()
                .any(|id| !selected.iter().any(|s| *s == id.as_ref().trim()));

        let filter = restrict.then(|| MetadataFilter::entities(selected.iter().copied()));
        debug!(restricted = restrict, candidates = selected.len(), "job matching");

        let hits = retriever
            .search(job_description, self.retrieval.match_k, filter.as_ref())
            .await?;
        let sources: Vec<Segment> = hits.into_iter().map(|h| h.segment).collect();
        let context = join_context(&sources);
        let prompt = template.render(MatchContext {
            context: &context,
            job_description,
        })?;

        self.answer(prompt, sources).await
    }

    /// Compare the selected candidates on the given criteria, using every
    /// segment (up to the per-candidate cap) of each.
    #[instrument(skip_all)]
    pub async fn compare<S: AsRef<str>>(
        &self,
        retriever: &Retriever,
        template: &PromptTemplate,
        criteria: &str,
        selected: &[S],
    ) -> Result<AssistantAnswer, AssistantError> {
        let selected = distinct_ids(selected);
        if selected.len() < 2 {
            return Err(AssistantError::NotEnoughCandidates { got: selected.len() });
        }

        let sources = retriever.retrieve_by_entity_ids(&selected, self.retrieval.per_entity_cap);
        let context = join_context(&sources);
        let prompt = template.render(CompareContext {
            context: &context,
            criteria,
        })?;

        self.answer(prompt, sources).await
    }

    async fn answer(&self, prompt: String, sources: Vec<Segment>) -> Result<AssistantAnswer, AssistantError> {
        debug!(sources = sources.len(), prompt_chars = prompt.len(), generator = self.generator.name(), "generating");

        let answer = tokio::time::timeout(self.timeout, self.generator.generate(&prompt))
            .await
            .map_err(|_| ProviderTimeout {
                operation: "generation",
                after: self.timeout,
            })??;

        Ok(AssistantAnswer { answer, sources })
    }
}

fn join_context(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Trimmed, non-blank ids in first-seen order.
fn distinct_ids<S: AsRef<str>>(ids: &[S]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.as_ref().trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .collect()
}
