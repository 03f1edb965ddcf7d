use serde::Deserialize;

/// Cursor state of a GraphQL connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl PageInfo {
    /// The cursor for the following page, if the server says there is one.
    pub fn next_cursor(&self) -> Option<&str> {
        if self.has_next_page {
            self.end_cursor.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Edge<N> {
    pub node: N,
}

/// `{pageInfo, edges: [{node}]}` as returned by every paginated query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<N> {
    pub page_info: PageInfo,
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<N>>,
}

impl<N> Connection<N> {
    pub fn into_nodes(self) -> (PageInfo, Vec<N>) {
        let nodes = self.edges.into_iter().map(|edge| edge.node).collect();
        (self.page_info, nodes)
    }
}
