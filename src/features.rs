//! Study-feature definitions: per-feature retrieval tuning, structured
//! response schemas, and the system prompts sent to the generation model.
//!
//! Every schema field is `#[serde(default)]` so a model that omits a field
//! degrades that field rather than failing the whole response.

use serde::{Deserialize, Serialize};

/// Matches retrieved for a chat turn.
pub const CHAT_TOP_K: usize = 5;
/// Character budget for chat context.
pub const CHAT_CONTEXT_CHARS: usize = 8000;

/// Matches retrieved for quiz generation.
pub const QUIZ_TOP_K: usize = 20;
/// Character budget for quiz context.
pub const QUIZ_CONTEXT_CHARS: usize = 12000;

/// Matches retrieved for flashcard generation.
pub const FLASHCARDS_TOP_K: usize = 12;
/// Character budget for flashcard context.
pub const FLASHCARDS_CONTEXT_CHARS: usize = 8000;

/// Matches retrieved for podcast script generation.
pub const PODCAST_TOP_K: usize = 15;
/// Character budget for podcast context.
pub const PODCAST_CONTEXT_CHARS: usize = 8000;

/// Matches retrieved for knowledge-graph extraction.
pub const GRAPH_TOP_K: usize = 12;
/// Character budget for graph context.
pub const GRAPH_CONTEXT_CHARS: usize = 8000;

/// Matches retrieved for the debate transcript.
pub const DEBATE_TOP_K: usize = 10;
/// Character budget for debate context.
pub const DEBATE_CONTEXT_CHARS: usize = 10000;

/// Matches retrieved for the source audit.
pub const AUDIT_TOP_K: usize = 15;
/// Character budget for audit context.
pub const AUDIT_CONTEXT_CHARS: usize = 10000;

/// One multiple-choice quiz question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Question identifier.
    #[serde(default)]
    pub id: u32,
    /// Question text.
    #[serde(default)]
    pub question: String,
    /// Four answer options.
    #[serde(default)]
    pub options: Vec<String>,
    /// The correct option, verbatim.
    #[serde(default)]
    pub answer: String,
    /// Short explanation of the correct answer.
    #[serde(default)]
    pub explanation: String,
    /// Concept the question tests.
    #[serde(default)]
    pub concept: String,
    /// Difficulty rating, 1 to 10.
    #[serde(default)]
    pub difficulty: u32,
}

/// Quiz payload returned to the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizResponse {
    /// Generated questions.
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

/// One question/answer flashcard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flashcard {
    /// Prompt side of the card.
    #[serde(default)]
    pub question: String,
    /// Answer side of the card.
    #[serde(default)]
    pub answer: String,
}

/// Flashcard payload returned to the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashcardsResponse {
    /// Generated cards.
    #[serde(default)]
    pub flashcards: Vec<Flashcard>,
}

/// One spoken turn in a podcast script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptTurn {
    /// Speaker label, `Host` or `Expert`.
    #[serde(default)]
    pub speaker: String,
    /// Spoken line.
    #[serde(default)]
    pub text: String,
}

/// Two-speaker podcast script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodcastScript {
    /// Dialogue turns in order.
    #[serde(default)]
    pub script: Vec<ScriptTurn>,
}

impl PodcastScript {
    /// Parse a script payload regardless of which top-level key the model
    /// chose. Models wrap the turns in `script`, `dialogue`, or a bare array.
    pub fn parse(raw: &str) -> Self {
        #[derive(Default, Deserialize)]
        struct Envelope {
            #[serde(default)]
            script: Vec<ScriptTurn>,
            #[serde(default)]
            dialogue: Vec<ScriptTurn>,
        }

        if let Ok(turns) = serde_json::from_str::<Vec<ScriptTurn>>(clean_fences(raw)) {
            return Self { script: turns };
        }

        let envelope: Envelope = crate::generation::parse_lenient(raw);
        let script = if envelope.script.is_empty() {
            envelope.dialogue
        } else {
            envelope.script
        };
        Self { script }
    }
}

fn clean_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// One concept node in the knowledge graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node identifier, referenced by links.
    #[serde(default)]
    pub id: String,
    /// Human-readable concept name.
    #[serde(default)]
    pub name: String,
    /// Centrality rating, 1 to 20.
    #[serde(default)]
    pub val: u32,
    /// Category: 1 main concept, 2 supporting detail, 3 technical term,
    /// 4 person/organization.
    #[serde(default)]
    pub group: u32,
}

/// One directed relationship between graph nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphLink {
    /// Source node id.
    #[serde(default)]
    pub source: String,
    /// Target node id.
    #[serde(default)]
    pub target: String,
    /// Relationship label.
    #[serde(default)]
    pub label: String,
}

/// Knowledge graph extracted from a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    /// Concept nodes.
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Relationships between nodes.
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

/// One turn in the three-agent debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebateTurn {
    /// Speaking agent name.
    #[serde(default)]
    pub agent: String,
    /// What the agent said.
    #[serde(default)]
    pub text: String,
}

/// Full debate transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebateTranscript {
    /// Turns in speaking order.
    #[serde(default)]
    pub transcript: Vec<DebateTurn>,
}

/// Source-reliability audit report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Factual-reliability score, 0 to 100.
    #[serde(default)]
    pub truth_score: u32,
    /// Bias score, 0 to 100, higher meaning more biased.
    #[serde(default)]
    pub bias_score: u32,
    /// Claims made without supporting evidence.
    #[serde(default)]
    pub unsupported_claims: Vec<String>,
    /// Assessment of where the material appears to come from.
    #[serde(default)]
    pub provenance: String,
}

/// System prompt for the streaming chat assistant, grounded in the retrieved
/// context.
pub fn chat_system_prompt(context: &str) -> String {
    format!(
        "You are NoteWave, a helpful research assistant. Answer the user's question using ONLY \
         the provided document context. If the context does not contain the answer, say so \
         plainly instead of guessing. Be concise and cite the relevant passage when helpful.\n\n\
         Document context:\n{context}"
    )
}

/// System prompt for quiz generation.
pub fn quiz_system_prompt(count: usize) -> String {
    format!(
        "Based on the context, generate exactly {count} multiple-choice questions. You must \
         tag each question with a 'concept' (the specific topic being tested) and a \
         'difficulty' level (1-10). Format the output as a JSON object: \
         {{\"questions\": [{{\"id\": 1, \"question\": \"Question text?\", \"options\": \
         [\"Option A\", \"Option B\", \"Option C\", \"Option D\"], \"answer\": \"Exact text of \
         the correct option\", \"explanation\": \"Brief reasoning.\", \"concept\": \"Name of \
         concept\", \"difficulty\": 1}}]}}. Each question must have exactly 4 options and be \
         answerable from the context alone."
    )
}

/// System prompt for flashcard generation.
pub fn flashcards_system_prompt() -> String {
    "Extract 8-10 flashcards from the text. Format MUST be a JSON object: \
     {\"flashcards\": [{\"question\": \"...\", \"answer\": \"...\"}]}. Keep questions concise \
     and answers informative."
        .to_string()
}

/// System prompt for podcast script generation.
pub fn podcast_system_prompt() -> String {
    "You are a podcast script writer. From the provided document content, write an engaging \
     two-person dialogue between \"Host\" and \"Expert\" that teaches the material. The Host \
     asks curious questions and keeps the energy up; the Expert explains clearly with concrete \
     examples from the document. 12 to 20 turns total. Respond with a JSON object of the form \
     {\"script\": [{\"speaker\": \"Host\", \"text\": \"...\"}]}."
        .to_string()
}

/// System prompt for knowledge-graph extraction.
pub fn graph_system_prompt() -> String {
    "You are a Knowledge Graph Architect. Extract the most important entities and their \
     relationships from the text. Return ONLY a JSON object: {\"nodes\": [{\"id\": \
     \"unique_id\", \"name\": \"Label\", \"group\": 1, \"val\": 10}], \"links\": [{\"source\": \
     \"id1\", \"target\": \"id2\", \"label\": \"Relation\"}]}. Groups: 1: Main Concept, 2: \
     Supporting Detail, 3: Technical Term, 4: Person/Organization. Importance (val): 1-20 \
     based on how central the concept is. Limit to 15-20 nodes for clarity."
        .to_string()
}

/// System prompt for the three-agent debate.
pub fn debate_system_prompt() -> String {
    "You are orchestrating a research debate between three agents: 1. Dr. Skeptic (Critic) — \
     challenging, academic, and rigorous; looks for logical fallacies and unsupported claims. \
     2. The Weaver (Synthesizer) — visionary and connective; links document concepts to \
     real-world current events. 3. Veritas (Fact-Checker) — precise and data-driven; \
     cross-references information for internal consistency. Based on the context, generate a \
     6-turn transcript where they debate the core thesis. Format: {\"transcript\": \
     [{\"agent\": \"Critic\", \"text\": \"...\"}]}"
        .to_string()
}

/// System prompt for the source-reliability audit.
pub fn audit_system_prompt() -> String {
    "You are a Document Integrity Auditor. Analyze the provided context for truthfulness and \
     bias. Return ONLY a JSON object: {\"truthScore\": 0-100, \"biasScore\": 0-100, \
     \"unsupportedClaims\": [\"List of suspicious or unverified claims found in text\"], \
     \"provenance\": \"PDF Metadata Signature\"}"
        .to_string()
}
