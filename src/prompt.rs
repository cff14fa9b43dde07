use std::fmt::Write;

use crate::model::{ScoredItem, yes_no};

/// Build the re-ranking prompt for `candidates`, asking the model to keep
/// `keep` of them.
pub fn refinement_prompt(query: &str, candidates: &[ScoredItem], keep: usize) -> String {
    let mut listing = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let item = &candidate.item;
        if i > 0 {
            listing.push_str("\n\n");
        }
        // Writing into a String cannot fail.
        let _ = write!(
            listing,
            "Assessment {}:\nName: {}\nDescription: {}\nType: {}\nDuration: {}\n\
             Remote: {}\nAdaptive: {}\nURL: {}\nCurrent Score: {:.2}",
            i + 1,
            item.name,
            item.description,
            item.test_type.join(", "),
            item.duration,
            yes_no(item.remote_support),
            yes_no(item.adaptive_support),
            item.url,
            candidate.score,
        );
    }

    format!(
        "You are an expert in psychometric assessments and HR technology.\n\
         Your task is to refine assessment recommendations for the user's query.\n\
         \n\
         User Query:\n\
         {query}\n\
         \n\
         Initial Recommendations (from vector search):\n\
         {listing}\n\
         \n\
         Instructions:\n\
         1. Select only the {keep} most relevant assessments.\n\
         2. Re-score each selected assessment between 0.0 and 1.0 based on:\n\
         - relevance to the query\n\
         - fit with any duration requirements\n\
         - match between the requested skills and the test type\n\
         3. Return exactly {keep} items, most relevant first.\n\
         4. Respond with nothing but a JSON array in this format:\n\
         [{{\"url\": \"...\", \"score\": 0.95}}]\n\
         \n\
         The output must be valid JSON that can be parsed directly."
    )
}
