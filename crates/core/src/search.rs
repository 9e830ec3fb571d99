use crate::error::SearchError;
use crate::models::{DocumentFilter, DocumentRecord, SearchOptions};
use crate::normalize::normalize_patient_name;
use crate::similarity::{compare_matches, score_match, MatchKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// One ranked document with the explanation of why it matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientMatch {
    pub record: DocumentRecord,
    pub similarity_score: f64,
    pub match_kind: MatchKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub search_term: String,
    pub normalized_term: String,
    pub matches: Vec<PatientMatch>,
    pub total_found: usize,
    pub limit: usize,
    pub skip: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
    pub strategies_used: Vec<MatchKind>,
    pub min_similarity: f64,
    pub searched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NameSuggestion {
    pub name: String,
    pub score: f64,
    pub frequency: usize,
}

/// Ranks documents by approximate patient-name similarity on top of a
/// [`crate::traits::DocumentRepository`].
///
/// Read operations are stateless with respect to each other; the engine can
/// serve any number of concurrent callers.
pub struct SearchEngine<R> {
    repository: Arc<R>,
    options: SearchOptions,
}

impl<R> Clone for SearchEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            options: self.options.clone(),
        }
    }
}

impl<R> SearchEngine<R>
where
    R: crate::traits::DocumentRepository + Send + Sync,
{
    pub fn new(repository: R, options: SearchOptions) -> Self {
        Self {
            repository: Arc::new(repository),
            options,
        }
    }

    pub fn with_repository(repository: Arc<R>, options: SearchOptions) -> Self {
        Self { repository, options }
    }

    /// Rank documents by approximate patient-name similarity.
    ///
    /// Candidates scoring below `min_similarity` (engine default when
    /// `None`) are excluded entirely. Ordering is deterministic: score
    /// descending, then shorter name, then lexical.
    pub async fn search_patients(
        &self,
        search_term: &str,
        owner_user_id: Option<&str>,
        min_similarity: Option<f64>,
        limit: usize,
        skip: usize,
    ) -> Result<SearchPage, SearchError> {
        let threshold = min_similarity.unwrap_or(self.options.min_similarity);
        self.search_internal(search_term, owner_user_id, threshold, None, limit, skip)
            .await
    }

    /// Distinct normalized names completing a partial term, prefix and
    /// substring strategies only (no fuzzy), ordered by score then
    /// frequency.
    pub async fn suggest_patient_names(
        &self,
        partial_term: &str,
        owner_user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NameSuggestion>, SearchError> {
        self.validate_pagination(limit)?;

        let normalized = normalize_patient_name(partial_term);
        if normalized.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let candidates = self.fetch_candidates(&normalized, owner_user_id).await?;

        let mut suggestions: Vec<NameSuggestion> = Vec::new();
        for record in &candidates {
            let Some(name) = record.normalized_patient_name() else {
                continue;
            };
            let Some(scored) = score_match(&normalized, name) else {
                continue;
            };
            if !matches!(
                scored.kind,
                MatchKind::Exact | MatchKind::Prefix | MatchKind::Substring
            ) {
                continue;
            }

            match suggestions.iter_mut().find(|entry| entry.name == name) {
                Some(entry) => {
                    entry.frequency += 1;
                    entry.score = entry.score.max(scored.score);
                }
                None => suggestions.push(NameSuggestion {
                    name: name.to_string(),
                    score: scored.score,
                    frequency: 1,
                }),
            }
        }

        suggestions.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| right.frequency.cmp(&left.frequency))
                .then_with(|| left.name.cmp(&right.name))
        });
        suggestions.truncate(limit);
        Ok(suggestions)
    }

    /// Documents belonging to one patient: the search operation restricted
    /// to exact and prefix matches.
    pub async fn documents_for_patient(
        &self,
        patient_name: &str,
        owner_user_id: Option<&str>,
        limit: usize,
        skip: usize,
    ) -> Result<SearchPage, SearchError> {
        const EXACT_OR_PREFIX: [MatchKind; 2] = [MatchKind::Exact, MatchKind::Prefix];
        self.search_internal(
            patient_name,
            owner_user_id,
            self.options.min_similarity,
            Some(&EXACT_OR_PREFIX),
            limit,
            skip,
        )
        .await
    }

    async fn search_internal(
        &self,
        search_term: &str,
        owner_user_id: Option<&str>,
        min_similarity: f64,
        allowed_kinds: Option<&[MatchKind]>,
        limit: usize,
        skip: usize,
    ) -> Result<SearchPage, SearchError> {
        self.validate_pagination(limit)?;

        let normalized = normalize_patient_name(search_term);
        if normalized.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let candidates = self.fetch_candidates(&normalized, owner_user_id).await?;
        debug!(
            term = %normalized,
            candidates = candidates.len(),
            "scoring search candidates"
        );

        let mut matches: Vec<PatientMatch> = candidates
            .into_iter()
            .filter_map(|record| {
                let scored = score_match(&normalized, record.normalized_patient_name()?)?;
                if scored.score < min_similarity {
                    return None;
                }
                if let Some(kinds) = allowed_kinds {
                    if !kinds.contains(&scored.kind) {
                        return None;
                    }
                }
                Some(PatientMatch {
                    record,
                    similarity_score: scored.score,
                    match_kind: scored.kind,
                })
            })
            .collect();

        matches.sort_by(|left, right| {
            compare_matches(
                left.similarity_score,
                left.record.normalized_patient_name().unwrap_or_default(),
                right.similarity_score,
                right.record.normalized_patient_name().unwrap_or_default(),
            )
        });

        let mut strategies_used: Vec<MatchKind> =
            matches.iter().map(|item| item.match_kind).collect();
        strategies_used.sort();
        strategies_used.dedup();

        let total_found = matches.len();
        let page: Vec<PatientMatch> = matches.into_iter().skip(skip).take(limit).collect();

        Ok(SearchPage {
            search_term: search_term.to_string(),
            normalized_term: normalized,
            matches: page,
            total_found,
            limit,
            skip,
            total_pages: total_found.div_ceil(limit),
            has_next: skip + limit < total_found,
            has_prev: skip > 0,
            strategies_used,
            min_similarity,
            searched_at: Utc::now(),
        })
    }

    /// Candidate superset: a cheap substring-bounded fetch, widened to a
    /// full named scan when too few rows come back to make fuzzy matching
    /// worthwhile.
    async fn fetch_candidates(
        &self,
        normalized_term: &str,
        owner_user_id: Option<&str>,
    ) -> Result<Vec<DocumentRecord>, SearchError> {
        let narrow = DocumentFilter {
            owner_user_id: owner_user_id.map(str::to_string),
            name_substring: Some(normalized_term.to_string()),
            requires_patient_name: true,
            ..Default::default()
        };

        let mut candidates = self
            .repository
            .find_many(&narrow, self.options.candidate_limit, 0)
            .await?
            .items;

        if candidates.len() < self.options.broad_scan_floor {
            let broad = DocumentFilter {
                owner_user_id: owner_user_id.map(str::to_string),
                requires_patient_name: true,
                ..Default::default()
            };
            let extra = self
                .repository
                .find_many(&broad, self.options.candidate_limit, 0)
                .await?
                .items;

            let mut seen: HashSet<String> = candidates
                .iter()
                .map(|record| record.document_id.clone())
                .collect();
            for record in extra {
                if seen.insert(record.document_id.clone()) {
                    candidates.push(record);
                }
            }
        }

        Ok(candidates)
    }

    fn validate_pagination(&self, limit: usize) -> Result<(), SearchError> {
        if limit == 0 {
            return Err(SearchError::InvalidPagination(
                "limit must be at least 1".to_string(),
            ));
        }
        if limit > self.options.max_limit {
            return Err(SearchError::InvalidPagination(format!(
                "limit {} exceeds the maximum of {}",
                limit, self.options.max_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SearchEngine;
    use crate::error::SearchError;
    use crate::models::{
        DocumentRecord, MedicalMetadata, ProcessingStatus, SearchOptions,
    };
    use crate::normalize::normalize_patient_name;
    use crate::similarity::MatchKind;
    use crate::stores::MemoryRepository;
    use crate::traits::DocumentRepository;
    use chrono::Utc;
    use uuid::Uuid;

    fn record_for(patient_name: &str, owner: Option<&str>) -> DocumentRecord {
        let now = Utc::now();
        DocumentRecord {
            document_id: Uuid::new_v4().to_string(),
            processing_id: Uuid::new_v4().to_string(),
            batch_id: None,
            batch_index: None,
            filename: format!("4000123456_{patient_name}_6001467010_CONS.pdf"),
            content_type: "application/pdf".to_string(),
            file_size: 10,
            checksum: "checksum".to_string(),
            owner_user_id: owner.map(str::to_string),
            description: None,
            tags: Vec::new(),
            storage: None,
            extracted_text: Some("texto".to_string()),
            ocr: None,
            medical: Some(MedicalMetadata {
                expediente: "4000123456".to_string(),
                nombre_paciente: patient_name.to_string(),
                normalized_patient_name: normalize_patient_name(patient_name),
                numero_episodio: "6001467010".to_string(),
                categoria: "CONS".to_string(),
            }),
            medical_info_error: None,
            processing_error: None,
            processing_status: ProcessingStatus::Completed,
            created_at: now,
            updated_at: now,
        }
    }

    async fn engine_with(names: &[&str]) -> SearchEngine<MemoryRepository> {
        let repository = MemoryRepository::new();
        for name in names {
            repository.insert_one(&record_for(name, None)).await.unwrap();
        }
        SearchEngine::new(repository, SearchOptions::default())
    }

    #[tokio::test]
    async fn exact_match_ranks_first() {
        let engine = engine_with(&[
            "GARCIA LOPEZ, MARIA",
            "GARCIA LOPEZ, MARIANA",
            "HERNANDEZ SILVA, ANA",
        ])
        .await;

        let page = engine
            .search_patients("GARCIA LOPEZ, MARIA", None, None, 10, 0)
            .await
            .unwrap();

        assert!(page.total_found >= 2);
        assert_eq!(page.matches[0].match_kind, MatchKind::Exact);
        assert_eq!(page.matches[0].similarity_score, 1.0);
        assert_eq!(
            page.matches[0].record.normalized_patient_name(),
            Some("GARCIA LOPEZ, MARIA")
        );
        assert!(page.strategies_used.contains(&MatchKind::Exact));
    }

    #[tokio::test]
    async fn below_threshold_candidates_never_appear() {
        let engine = engine_with(&["GARCIA LOPEZ, MARIA", "ZAPATA QUIROZ, HUGO"]).await;

        let page = engine
            .search_patients("GARCIA LOPEZ, MARIA", None, Some(0.9), 10, 0)
            .await
            .unwrap();

        assert!(page
            .matches
            .iter()
            .all(|item| item.similarity_score >= 0.9));
        assert!(page
            .matches
            .iter()
            .all(|item| item.record.normalized_patient_name() != Some("ZAPATA QUIROZ, HUGO")));
    }

    #[tokio::test]
    async fn swapped_order_query_matches_fuzzily() {
        let engine = engine_with(&["ALANIS VILLAGRAN, MARIA DE LOS ANGELES"]).await;

        let page = engine
            .search_patients("maria alanis", None, None, 10, 0)
            .await
            .unwrap();

        assert_eq!(page.total_found, 1);
        let hit = &page.matches[0];
        assert!(matches!(
            hit.match_kind,
            MatchKind::Fuzzy | MatchKind::TextSearch
        ));
        assert!(hit.similarity_score > 0.3 && hit.similarity_score <= 0.7);
    }

    #[tokio::test]
    async fn owner_filter_limits_results() {
        let repository = MemoryRepository::new();
        repository
            .insert_one(&record_for("GARCIA LOPEZ, MARIA", Some("user-a")))
            .await
            .unwrap();
        repository
            .insert_one(&record_for("GARCIA LOPEZ, MARIA", Some("user-b")))
            .await
            .unwrap();
        let engine = SearchEngine::new(repository, SearchOptions::default());

        let page = engine
            .search_patients("GARCIA LOPEZ, MARIA", Some("user-a"), None, 10, 0)
            .await
            .unwrap();

        assert_eq!(page.total_found, 1);
        assert_eq!(
            page.matches[0].record.owner_user_id.as_deref(),
            Some("user-a")
        );
    }

    #[tokio::test]
    async fn pagination_concatenation_reproduces_full_ranking() {
        let names = [
            "GARCIA LOPEZ, MARIA",
            "GARCIA LOPEZ, MARIANA",
            "GARCIA LOPEZ, MARIO",
            "GARCIA PEREZ, MARTA",
            "GARCIA, MAR",
        ];
        let engine = engine_with(&names).await;

        let full = engine
            .search_patients("GARCIA", None, None, 100, 0)
            .await
            .unwrap();

        let mut concatenated = Vec::new();
        let mut skip = 0;
        loop {
            let page = engine
                .search_patients("GARCIA", None, None, 2, skip)
                .await
                .unwrap();
            if page.matches.is_empty() {
                break;
            }
            skip += 2;
            concatenated.extend(
                page.matches
                    .into_iter()
                    .map(|item| item.record.document_id),
            );
        }

        let full_ids: Vec<_> = full
            .matches
            .into_iter()
            .map(|item| item.record.document_id)
            .collect();
        assert_eq!(concatenated, full_ids);
    }

    #[tokio::test]
    async fn page_flags_are_derived_from_totals() {
        let engine = engine_with(&[
            "GARCIA LOPEZ, MARIA",
            "GARCIA LOPEZ, MARIANA",
            "GARCIA LOPEZ, MARIO",
        ])
        .await;

        let page = engine
            .search_patients("GARCIA", None, None, 2, 2)
            .await
            .unwrap();

        assert_eq!(page.total_found, 3);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_prev);
        assert!(!page.has_next);
        assert_eq!(page.matches.len(), 1);
    }

    #[tokio::test]
    async fn invalid_pagination_is_rejected_before_repository_access() {
        let engine = engine_with(&[]).await;

        assert!(matches!(
            engine.search_patients("GARCIA", None, None, 0, 0).await,
            Err(SearchError::InvalidPagination(_))
        ));
        assert!(matches!(
            engine.search_patients("GARCIA", None, None, 10_000, 0).await,
            Err(SearchError::InvalidPagination(_))
        ));
    }

    #[tokio::test]
    async fn empty_search_term_is_rejected() {
        let engine = engine_with(&[]).await;
        assert!(matches!(
            engine.search_patients("   ", None, None, 10, 0).await,
            Err(SearchError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn suggestions_are_deduplicated_and_never_fuzzy() {
        let engine = engine_with(&[
            "GARCIA LOPEZ, MARIA",
            "GARCIA LOPEZ, MARIA",
            "GARCIA LOPEZ, MARIANA",
            "GARCES LOPEZ, MARIA",
        ])
        .await;

        let suggestions = engine
            .suggest_patient_names("GARCIA", None, 10)
            .await
            .unwrap();

        let names: Vec<_> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"GARCIA LOPEZ, MARIA"));
        assert!(names.contains(&"GARCIA LOPEZ, MARIANA"));
        // "GARCES LOPEZ, MARIA" only matches fuzzily, so it is not suggested.
        assert!(!names.contains(&"GARCES LOPEZ, MARIA"));

        let duplicated = suggestions
            .iter()
            .find(|s| s.name == "GARCIA LOPEZ, MARIA")
            .unwrap();
        assert_eq!(duplicated.frequency, 2);
    }

    #[tokio::test]
    async fn documents_for_patient_excludes_substring_matches() {
        let engine = engine_with(&[
            "GARCIA LOPEZ, MARIA",
            "DE LA GARCIA TORRES, JUAN",
        ])
        .await;

        let page = engine
            .documents_for_patient("GARCIA", None, 10, 0)
            .await
            .unwrap();

        assert!(page
            .matches
            .iter()
            .all(|item| matches!(item.match_kind, MatchKind::Exact | MatchKind::Prefix)));
        assert!(page
            .matches
            .iter()
            .all(|item| item.record.normalized_patient_name()
                != Some("DE LA GARCIA TORRES, JUAN")));
    }
}
