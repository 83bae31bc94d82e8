//! Neo4j-backed `GraphStore` adapter (§4.3).
//!
//! Cypher queries mirror the original graph service's `find_article`,
//! `find_related_articles`, and `search_by_keyword` one-to-one; only the
//! client library changes (Bolt via `neo4rs` instead of the Python driver).

use async_trait::async_trait;
use neo4rs::{Graph, Query as CypherQuery};

use horei_core::{Error as CoreError, GraphStore};
use horei_core::domain::GraphResult;

use crate::RagError;

/// Bounded traversal depth for `REFERENCES` edges (§4.3, §9: "traversal is
/// bounded by depth (≤2)").
pub const MAX_GRAPH_DEPTH: u8 = 2;

/// Fixed relevance assigned to keyword-matched results (§4.3).
const KEYWORD_SEARCH_RELEVANCE: f32 = 0.8;

/// Fixed relevance assigned to a direct anchored lookup (§4.3).
const DIRECT_LOOKUP_RELEVANCE: f32 = 1.0;

/// Exponential decay base applied per traversal hop (§4.3, §9).
const RELATED_DECAY_BASE: f32 = 0.95;

pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, RagError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| RagError::Connection(e.to_string()))?;
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn find_article(
        &self,
        law_title: &str,
        article_num: &str,
    ) -> Result<Option<GraphResult>, CoreError> {
        let cypher = r#"
            MATCH (l:Law)-[:HAS_CHAPTER]->(c:Chapter)-[:HAS_ARTICLE]->(a:Article)
            WHERE l.title CONTAINS $law_title AND a.num = $article_num
            OPTIONAL MATCH (a)-[:HAS_PARAGRAPH]->(p:Paragraph)
            RETURN l.law_id AS law_id, l.title AS law_title,
                   a.num AS article_num, a.title AS article_title, a.caption AS caption,
                   collect(p.chunk_id)[0] AS chunk_id
            LIMIT 1
        "#;

        let query = CypherQuery::new(cypher.to_string())
            .param("law_title", law_title)
            .param("article_num", article_num);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::transient(format!("graph find_article failed: {e}")))?;

        match stream.next().await {
            Ok(Some(row)) => Ok(Some(row_to_direct_result(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "graph find_article row error, treating as not found");
                Ok(None)
            }
        }
    }

    async fn find_related(
        &self,
        law_id: &str,
        article_num: &str,
        depth: u8,
        limit: usize,
    ) -> Result<Vec<GraphResult>, CoreError> {
        let depth = depth.min(MAX_GRAPH_DEPTH);

        let cypher = format!(
            r#"
            MATCH (start:Article {{law_id: $law_id, num: $article_num}})
            MATCH path = (start)-[:REFERENCES*1..{depth}]-(related:Article)
            WHERE related.law_id = $law_id AND related.num <> $article_num
            MATCH (l:Law {{law_id: related.law_id}})
            OPTIONAL MATCH (related)-[:HAS_PARAGRAPH]->(p:Paragraph)
            RETURN DISTINCT l.law_id AS law_id, l.title AS law_title,
                   related.num AS article_num, related.title AS article_title,
                   related.caption AS caption,
                   collect(DISTINCT p.chunk_id)[0] AS chunk_id,
                   length(path) AS distance
            ORDER BY distance
            LIMIT $limit
            "#
        );

        let query = CypherQuery::new(cypher)
            .param("law_id", law_id)
            .param("article_num", article_num)
            .param("limit", limit as i64);

        let mut stream = match self.graph.execute(query).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "graph find_related query failed, returning empty");
                return Ok(Vec::new());
            }
        };

        let mut results = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(row)) => {
                    let distance: i64 = row.get("distance").unwrap_or(1);
                    match row_to_related_result(&row, distance as u32) {
                        Ok(result) => results.push(result),
                        Err(e) => tracing::warn!(error = %e, "skipping malformed graph row"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "graph find_related row error, stopping early");
                    break;
                }
            }
        }

        Ok(results)
    }

    async fn keyword_search(&self, keyword: &str, limit: usize) -> Result<Vec<GraphResult>, CoreError> {
        let cypher = r#"
            MATCH (l:Law)-[:HAS_CHAPTER]->(:Chapter)-[:HAS_ARTICLE]->(a:Article)
            WHERE a.title CONTAINS $keyword OR a.caption CONTAINS $keyword
                  OR l.title CONTAINS $keyword
            OPTIONAL MATCH (a)-[:HAS_PARAGRAPH]->(p:Paragraph)
            RETURN DISTINCT l.law_id AS law_id, l.title AS law_title,
                   a.num AS article_num, a.title AS article_title, a.caption AS caption,
                   collect(DISTINCT p.chunk_id)[0] AS chunk_id
            LIMIT $limit
        "#;

        let query = CypherQuery::new(cypher.to_string())
            .param("keyword", keyword)
            .param("limit", limit as i64);

        let mut stream = match self.graph.execute(query).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "graph keyword_search failed, returning empty");
                return Ok(Vec::new());
            }
        };

        let mut results = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(row)) => match row_to_keyword_result(&row) {
                    Ok(result) => results.push(result),
                    Err(e) => tracing::warn!(error = %e, "skipping malformed graph row"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "graph keyword_search row error, stopping early");
                    break;
                }
            }
        }

        Ok(results)
    }
}

fn row_to_direct_result(row: &neo4rs::Row) -> Result<GraphResult, CoreError> {
    let law_id: String = row
        .get("law_id")
        .map_err(|e| CoreError::transient(format!("missing law_id: {e}")))?;
    let law_title: String = row
        .get("law_title")
        .map_err(|e| CoreError::transient(format!("missing law_title: {e}")))?;
    let article_num: String = row
        .get("article_num")
        .map_err(|e| CoreError::transient(format!("missing article_num: {e}")))?;
    let article_title: Option<String> = row.get("article_title").ok();
    let article_caption: Option<String> = row.get("caption").ok();
    let chunk_id: Option<String> = row.get("chunk_id").ok();

    Ok(GraphResult {
        highlight_path: vec![law_title.clone(), format!("第{article_num}条")],
        law_id,
        law_title,
        article_num,
        article_title,
        article_caption,
        chunk_id: chunk_id.unwrap_or_default(),
        relevance: DIRECT_LOOKUP_RELEVANCE,
    })
}

fn row_to_related_result(row: &neo4rs::Row, distance: u32) -> Result<GraphResult, CoreError> {
    let law_id: String = row
        .get("law_id")
        .map_err(|e| CoreError::transient(format!("missing law_id: {e}")))?;
    let law_title: String = row
        .get("law_title")
        .map_err(|e| CoreError::transient(format!("missing law_title: {e}")))?;
    let article_num: String = row
        .get("article_num")
        .map_err(|e| CoreError::transient(format!("missing article_num: {e}")))?;
    let article_title: Option<String> = row.get("article_title").ok();
    let article_caption: Option<String> = row.get("caption").ok();
    let chunk_id: Option<String> = row.get("chunk_id").ok();

    Ok(GraphResult {
        highlight_path: vec![law_title.clone(), format!("第{article_num}条")],
        law_id,
        law_title,
        article_num,
        article_title,
        article_caption,
        chunk_id: chunk_id.unwrap_or_default(),
        relevance: RELATED_DECAY_BASE.powi(distance as i32),
    })
}

fn row_to_keyword_result(row: &neo4rs::Row) -> Result<GraphResult, CoreError> {
    let law_id: String = row
        .get("law_id")
        .map_err(|e| CoreError::transient(format!("missing law_id: {e}")))?;
    let law_title: String = row
        .get("law_title")
        .map_err(|e| CoreError::transient(format!("missing law_title: {e}")))?;
    let article_num: String = row
        .get("article_num")
        .map_err(|e| CoreError::transient(format!("missing article_num: {e}")))?;
    let article_title: Option<String> = row.get("article_title").ok();
    let article_caption: Option<String> = row.get("caption").ok();
    let chunk_id: Option<String> = row.get("chunk_id").ok();

    Ok(GraphResult {
        highlight_path: vec![law_title.clone(), format!("第{article_num}条")],
        law_id,
        law_title,
        article_num,
        article_title,
        article_caption,
        chunk_id: chunk_id.unwrap_or_default(),
        relevance: KEYWORD_SEARCH_RELEVANCE,
    })
}
