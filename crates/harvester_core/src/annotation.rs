pub const PR_STATE_COLUMN: &str = "pr_state";
pub const REPOSITORY_COLUMN: &str = "repository";
pub const NUMBER_COLUMN: &str = "number";

/// Written when the API answers with an error for a pull request.
pub const UNKNOWN_STATE: &str = "Unknown";

/// Header of the annotated dataset: the input header followed by `pr_state`.
pub fn annotated_header<S: AsRef<str>>(input_header: &[S]) -> Vec<String> {
    let mut header: Vec<String> = input_header
        .iter()
        .map(|column| column.as_ref().to_string())
        .filter(|column| column != PR_STATE_COLUMN)
        .collect();
    header.push(PR_STATE_COLUMN.to_string());
    header
}
