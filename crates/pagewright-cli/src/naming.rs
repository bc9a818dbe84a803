//! Page-name unification: collapse near-duplicate names into a canonical
//! set and remap every event onto it.

use std::collections::{BTreeSet, HashMap};

use pagewright::{parse_json_reply, with_retry, AutomationError, ChatMessage, ChatModel, EnrichedRecording};
use tracing::info;

/// Replace each event's page name with its canonical form.
pub async fn unify_page_names(
    mut enriched: EnrichedRecording,
    model: &dyn ChatModel,
) -> anyhow::Result<EnrichedRecording> {
    let page_names: BTreeSet<String> = enriched
        .events
        .iter()
        .map(|e| e.page_name.clone())
        .collect();
    if page_names.is_empty() {
        return Ok(enriched);
    }

    let canonical = unique_page_names(model, &page_names).await?;
    info!(canonical = canonical.len(), original = page_names.len(), "page names unified");

    let mut mapping: HashMap<String, String> = HashMap::new();
    for name in &page_names {
        let refined = refine_page_name(model, name, &canonical).await?;
        mapping.insert(name.clone(), refined);
    }

    for event in &mut enriched.events {
        event.page_name = mapping[&event.page_name].clone();
    }
    Ok(enriched)
}

/// One call over the whole sorted name list; adjacency is a dedup signal,
/// so the ordering is part of the prompt.
async fn unique_page_names(
    model: &dyn ChatModel,
    names: &BTreeSet<String>,
) -> anyhow::Result<Vec<String>> {
    let listed = names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let messages = vec![
        ChatMessage::system("You are helpful data extraction agent and business analyst"),
        ChatMessage::user(format!(
            "Your task is to remove duplicate or similar page names. Page next to each other may be related, order matters!\n\
             Page names are:\n\
             {listed}\n\
             Do not introduce new names, do not mix technical concepts and business concepts\n\
             Respond with raw JSON array - [\"pageName\"], without reasoning or references or markdown."
        )),
    ];

    let unique = with_retry(3, || async {
        let reply = model.generate(&messages).await?;
        parse_json_reply::<Vec<String>>(&reply.text)
    })
    .await?;
    Ok(unique)
}

/// Map one original name onto the canonical set by asking for a relatedness
/// rating per candidate and keeping the best.
async fn refine_page_name(
    model: &dyn ChatModel,
    page_name: &str,
    canonical: &[String],
) -> anyhow::Result<String> {
    if canonical.iter().any(|c| c == page_name) {
        return Ok(page_name.to_string());
    }

    let mut best_match = String::new();
    let mut best_score = 0i32;
    for target in canonical {
        let messages = vec![
            ChatMessage::system("You are helpful data extraction agent, and business analyst"),
            ChatMessage::user(format!(
                "Your task is rate from 0 (not related) to 100 (related) if the following page name '{page_name}' is closely related to '{target}'.\n\
                 Do not mix technical concepts and business concepts,\n\
                 Respond with raw rating number only!, without reasoning or references"
            )),
        ];
        let rating = with_retry(3, || async {
            let reply = model.generate(&messages).await?;
            reply
                .text
                .trim()
                .parse::<i32>()
                .map_err(|_| AutomationError::Llm(format!("rating was not a number: {}", reply.text)))
        })
        .await?;

        if best_score < rating {
            best_score = rating;
            best_match = target.clone();
        }
    }

    Ok(best_match)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockModel;
    use pagewright::{EnrichedRecordingEvent, EventKind};

    fn event(page_name: &str) -> EnrichedRecordingEvent {
        EnrichedRecordingEvent {
            html_snapshot_id: 0,
            page_name: page_name.to_string(),
            kind: EventKind::MouseClick,
            node_id: "node".to_string(),
            xpath: "//a".to_string(),
            human_readable_node_name: "link".to_string(),
            text: None,
            char_code: None,
            current_url: None,
        }
    }

    fn enriched(names: &[&str]) -> EnrichedRecording {
        EnrichedRecording {
            html_snapshots: vec![String::new()],
            events: names.iter().map(|n| event(n)).collect(),
        }
    }

    #[tokio::test]
    async fn near_duplicates_collapse_onto_best_rated_name() {
        // Sorted distinct names: "cart", "login", "login page".
        // "cart" and "login" survive verbatim; "login page" gets rated
        // against both canonical names and lands on "login".
        let model = MockModel::new(vec![
            r#"["cart", "login"]"#.to_string(),
            "5".to_string(),
            "95".to_string(),
        ]);

        let unified = unify_page_names(enriched(&["login", "login page", "cart"]), &model)
            .await
            .unwrap();

        let names: Vec<_> = unified.events.iter().map(|e| e.page_name.as_str()).collect();
        assert_eq!(names, vec!["login", "login", "cart"]);
        assert!(model.is_exhausted());
    }

    #[tokio::test]
    async fn canonical_names_pass_through_without_rating_calls() {
        let model = MockModel::new(vec![r#"["cart"]"#.to_string()]);
        let unified = unify_page_names(enriched(&["cart", "cart"]), &model).await.unwrap();
        assert!(unified.events.iter().all(|e| e.page_name == "cart"));
        // Only the dedup call happened.
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_dedup_reply_is_retried() {
        let model = MockModel::new(vec![
            "not json".to_string(),
            r#"["cart"]"#.to_string(),
        ]);
        let unified = unify_page_names(enriched(&["cart"]), &model).await.unwrap();
        assert_eq!(unified.events[0].page_name, "cart");
    }

    #[tokio::test]
    async fn empty_recording_needs_no_model() {
        let model = MockModel::new(vec![]);
        let unified = unify_page_names(
            EnrichedRecording {
                html_snapshots: vec![],
                events: vec![],
            },
            &model,
        )
        .await
        .unwrap();
        assert!(unified.events.is_empty());
        assert!(model.calls().is_empty());
    }
}
