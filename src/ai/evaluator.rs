//! Story evaluation
//!
//! Builds the literary-consultant rubric prompt and runs it through the
//! generation client with the separately configured evaluation model.

use crate::database::Settings;
use crate::error::AppError;

use super::client::OpenRouterClient;

/// Genre assumed when the author has not specified one
pub const DEFAULT_GENRE: &str = "Fiction";

/// Style assumed when the author has not specified one
pub const DEFAULT_STYLE: &str = "Contemporary";

/// Default author notes passed to the rubric
pub const DEFAULT_NOTES: &str = "Please provide detailed feedback";

const EVALUATION_TEMPLATE: &str = r#"
system:
I am a literary consultant evaluating a manuscript for readiness for professional editing or self-publishing. My goal is to provide a clear recommendation on whether the story is ready for the next stage, along with a detailed report justifying my decision and offering specific suggestions for improvement if needed.

user:
The expected genre of the story is:

{genre}

The expected style of the story is:

{style}

Here are other considerations or requests from the author:

{notes}

This is the story so far:

{prose}

Your evaluation should be structured as follows:

1. Readiness Verdict (Top-Line Decision):

Based on your overall assessment, provide a clear verdict:

✅ Ready for Editing/Publishing (Minor Polish Recommended): Indicate that the story is fundamentally sound and ready for professional editing or self-publishing with minor revisions.

❌ Needs Revision Before Editing/Publishing: Indicate that the story requires significant revisions before it's ready for professional editing or self-publishing.

❌ Not Ready for Editing/Publishing (Major Overhaul Needed): Indicate that the story has significant fundamental issues and requires a major overhaul before considering editing or publishing.

2. Detailed Category Assessment and Justification:

For each category below, provide a score out of 10 and a detailed explanation justifying your score and how it impacts the story's readiness for editing/publishing. Use ✅ symbol to indicate categories that are particularly strong. Use the ❌ symbol to highlight areas that are significant roadblocks to readiness.

Plot Structure & Completeness: (Score / 10)

Pacing & Momentum for Reader Engagement: (Score / 10)

Character Development & Believability: (Score / 10)

Worldbuilding & Setting (if applicable): (Score / 10)

Dialogue Effectiveness & Naturalness: (Score / 10)

Writing Quality & Clarity: (Score / 10)

Word Choice & Impact: (Score / 10)

Clichés & Originality of Voice: (Score / 10)

Repetition & Redundancy: (Score / 10)

Readability & Flow for Target Audience: (Score / 10)

Genre Convention Adherence & Subversion (if genre is specified): (Score / 10)

Overall Reader Experience & Impact: (Score / 10)

3. Appendix: Actionable Steps for Improvement (If Needed):

If the "Readiness Verdict" is "Needs Revision Before Editing/Publishing" or "Not Ready for Editing/Publishing (Major Overhaul Needed)," provide a detailed list of actionable steps with examples included that the author should take to improve the manuscript. Focus on the weakest areas identified in your category assessments. For each point, explain why it's important for readiness and how to address it concretely. Prioritize the most critical improvements needed to reach readiness. If the verdict is "Ready for Editing/Publishing (Minor Polish Recommended)," this section can offer suggestions for minor polishing during the editing phase.
"#;

/// Build the full evaluation prompt embedding the prose and parameters
pub fn build_evaluation_prompt(prose: &str, genre: &str, style: &str, notes: &str) -> String {
    EVALUATION_TEMPLATE
        .replace("{genre}", genre)
        .replace("{style}", style)
        .replace("{notes}", notes)
        .replace("{prose}", prose)
}

/// Evaluate the given prose, using the configured evaluation model
pub async fn evaluate_story(
    client: &OpenRouterClient,
    prose: &str,
    settings: &Settings,
) -> Result<String, AppError> {
    let prompt = build_evaluation_prompt(prose, DEFAULT_GENRE, DEFAULT_STYLE, DEFAULT_NOTES);
    client
        .generate_with_model(&prompt, settings, settings.evaluation_model())
        .await
}
