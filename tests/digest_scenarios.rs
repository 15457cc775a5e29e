//! End-to-end digest parsing through the public API.

use haro_assist::pipeline::{
    DigestFilter, KeywordClassifier, KeywordTables, extract_queries, parse_digest,
};

const SCENARIO_1: &str = "Summary: Need expert on energy billing\n\
Category: Personal Finance\n\
Query: How can consumers reduce smart meter costs?\n\
Email: reply-1@example.com\n\
Requirements: 200 words";

const SCENARIO_2: &str = "Summary: Weekend promotions roundup\n\
Category: Sports\n\
Query: Best odds for this weekend's sportsbook promotions\n\
Email: reply-2@example.com\n\
Requirements: Operators only";

#[test]
fn scenario_1_single_relevant_query() {
    let queries = parse_digest(SCENARIO_1);
    assert_eq!(queries.len(), 1);

    let q = &queries[0];
    assert_eq!(q.title, "Need expert on energy billing");
    assert_eq!(q.publication, "Personal Finance");
    assert_eq!(q.query_text, "How can consumers reduce smart meter costs?");
    assert_eq!(q.reply_to.as_deref(), Some("reply-1@example.com"));
}

#[test]
fn scenario_2_excluded_query_is_extracted_but_dropped() {
    let extracted = extract_queries(SCENARIO_2);
    assert_eq!(extracted.len(), 1);
    assert_eq!(
        extracted[0].query_text,
        "Best odds for this weekend's sportsbook promotions"
    );
    assert_eq!(extracted[0].reply_to.as_deref(), Some("reply-2@example.com"));

    let classifier = KeywordClassifier::default();
    assert!(classifier.is_excluded(extracted[0].query_text.as_str()));
    assert!(!classifier.is_relevant(extracted[0].query_text.as_str()));
    assert!(parse_digest(SCENARIO_2).is_empty());
}

#[test]
fn scenario_3_keeps_only_relevant_block_in_order() {
    let body = format!("{SCENARIO_2}\n{SCENARIO_1}\n");
    let queries = parse_digest(&body);

    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].title, "Need expert on energy billing");
    assert_eq!(queries[0].reply_to.as_deref(), Some("reply-1@example.com"));
}

#[test]
fn scenario_4_missing_email_leaves_reply_to_absent() {
    let body = "Summary: Solar panel payback periods\n\
Category: Home Improvement\n\
Query: How long does a residential solar install take to pay for itself?\n\
Requirements: Installers preferred";

    let queries = parse_digest(body);
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].reply_to, None);
    assert!(!queries[0].has_destination());
}

#[test]
fn realistic_digest_with_preamble_and_footer() {
    let body = "\
Hello,

Here are today's journalist requests. Please read the rules before pitching.

Summary: Utility bill shock this winter
Category: Consumer News
Query: Why are electricity rates climbing, and what can households do?
Email: query-101@helpareporter.example
Requirements: Licensed energy advisors only

Summary: Fintech tools for freelancers
Category: Money
Query: Which digital payments apps help freelancers with cash flow?
Email: query-102@helpareporter.example
Requirements: Founders welcome

-----
";

    // The greeting forms a leading block of its own; it has no query text.
    let extracted = extract_queries(body);
    assert_eq!(extracted.len(), 3);
    assert_eq!(extracted[0].query_text, "");

    let queries = parse_digest(body);
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].publication, "Consumer News");
    assert_eq!(
        queries[0].reply_to.as_deref(),
        Some("query-101@helpareporter.example")
    );
    assert_eq!(queries[1].title, "Fintech tools for freelancers");
    assert_eq!(
        queries[1].reply_to.as_deref(),
        Some("query-102@helpareporter.example")
    );
}

#[test]
fn custom_tables_change_relevance_not_extraction() {
    let filter = DigestFilter::with_tables(KeywordTables::new(["meter"], ["billing"]));

    // "billing" is only in the title; relevance looks at the query text.
    let queries = filter.parse(SCENARIO_1);
    assert_eq!(queries.len(), 1);

    let filter = DigestFilter::with_tables(KeywordTables::new(["meter"], ["consumers"]));
    assert!(filter.parse(SCENARIO_1).is_empty());
    assert_eq!(extract_queries(SCENARIO_1).len(), 1);
}

#[test]
fn malformed_digest_yields_nothing() {
    assert!(parse_digest("").is_empty());
    assert!(parse_digest("No labels here at all, just a newsletter about energy.").is_empty());
}
