//! GraphQL documents for the GitHub API. Every paginated query takes `$cursor`.

pub const SEARCH_REPOSITORIES: &str = r#"
query ($searchQuery: String!, $first: Int!, $cursor: String) {
  search(query: $searchQuery, type: REPOSITORY, first: $first, after: $cursor) {
    pageInfo {
      endCursor
      hasNextPage
    }
    edges {
      node {
        ... on Repository {
          name
          owner {
            login
          }
        }
      }
    }
  }
}
"#;

pub const SEARCH_CONNECTION: &str = "/search";

pub const PULL_REQUESTS: &str = r#"
query ($owner: String!, $name: String!, $first: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: $first, states: [MERGED, CLOSED], after: $cursor) {
      pageInfo {
        endCursor
        hasNextPage
      }
      edges {
        node {
          number
          title
          createdAt
          mergedAt
          closedAt
          bodyText
          reviews { totalCount }
          files { totalCount }
          additions
          deletions
          comments { totalCount }
          participants { totalCount }
          state
        }
      }
    }
  }
}
"#;

pub const PULL_REQUESTS_CONNECTION: &str = "/repository/pullRequests";

pub const PULL_REQUEST_STATE: &str = r#"
query ($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $number) {
      state
    }
  }
}
"#;

pub const PULL_REQUEST_STATE_FIELD: &str = "/repository/pullRequest/state";
