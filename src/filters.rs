//! filters.rs
//!
//! Фильтрация списков по параметрам запроса.
//!
//! Поддерживаются два вида фильтров:
//! - текстовые (`name`, `title`) - вхождение подстроки без учёта регистра;
//! - наборы id (`themes`, `astronomy_shows`, ...) - список целых через запятую,
//!   запись подходит, если хотя бы один связанный id входит в набор.
//!
//! Разные ключи объединяются по AND, результат всегда без дублей.
//! Один и тот же [`FilterSet`] применяется к записям в памяти ([`FilterSet::apply`])
//! и переводится в SQL хранилищем Postgres.

use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Распознаваемый параметр фильтрации.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Name,
    Title,
    Themes,
    AstronomyShows,
    PlanetariumDomes,
    ShowSessions,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    IdSet,
}

impl FilterKey {
    pub fn param(self) -> &'static str {
        match self {
            FilterKey::Name => "name",
            FilterKey::Title => "title",
            FilterKey::Themes => "themes",
            FilterKey::AstronomyShows => "astronomy_shows",
            FilterKey::PlanetariumDomes => "planetarium_domes",
            FilterKey::ShowSessions => "show_sessions",
            FilterKey::User => "user",
        }
    }

    pub fn kind(self) -> FilterKind {
        match self {
            FilterKey::Name | FilterKey::Title => FilterKind::Text,
            _ => FilterKind::IdSet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter '{key}' expects comma-separated integer ids, got '{token}'")]
    MalformedId { key: &'static str, token: String },
}

/// Одно условие фильтра.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Подстрока, уже в нижнем регистре.
    Contains { key: FilterKey, needle: String },
    MemberOf { key: FilterKey, ids: BTreeSet<i64> },
}

impl Criterion {
    pub fn key(&self) -> FilterKey {
        match self {
            Criterion::Contains { key, .. } | Criterion::MemberOf { key, .. } => *key,
        }
    }

    fn matches<R: Filterable>(&self, record: &R) -> bool {
        match self {
            Criterion::Contains { key, needle } => record
                .text(*key)
                .is_some_and(|text| text.to_lowercase().contains(needle.as_str())),
            Criterion::MemberOf { key, ids } => {
                record.related(*key).iter().any(|id| ids.contains(id))
            }
        }
    }
}

/// Запись, которую можно фильтровать по [`FilterKey`].
pub trait Filterable {
    fn id(&self) -> i64;

    /// Текстовое поле для текстового ключа.
    fn text(&self, _key: FilterKey) -> Option<&str> {
        None
    }

    /// Связанные id для ключа-набора: один внешний ключ или все элементы many-to-many.
    fn related(&self, _key: FilterKey) -> &[i64] {
        &[]
    }
}

/// Разобранный набор условий. Пустой набор пропускает всё.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    criteria: Vec<Criterion>,
}

impl FilterSet {
    /// Разбирает сырые параметры запроса. Учитываются только ключи из `recognized`,
    /// пустое значение означает отсутствие ограничения.
    pub fn parse(
        recognized: &[FilterKey],
        raw: &HashMap<String, String>,
    ) -> Result<Self, FilterError> {
        let mut criteria = Vec::new();
        for key in recognized {
            let Some(value) = raw.get(key.param()) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let criterion = match key.kind() {
                FilterKind::Text => Criterion::Contains {
                    key: *key,
                    needle: value.to_lowercase(),
                },
                FilterKind::IdSet => Criterion::MemberOf {
                    key: *key,
                    ids: parse_ids(*key, value)?,
                },
            };
            criteria.push(criterion);
        }
        Ok(FilterSet { criteria })
    }

    /// Добавляет ограничение по набору id поверх уже разобранных условий.
    pub fn restrict(mut self, key: FilterKey, ids: impl IntoIterator<Item = i64>) -> Self {
        self.criteria.push(Criterion::MemberOf {
            key,
            ids: ids.into_iter().collect(),
        });
        self
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn matches<R: Filterable>(&self, record: &R) -> bool {
        self.criteria.iter().all(|criterion| criterion.matches(record))
    }

    /// Оставляет подходящие записи, сохраняя порядок и убирая повторы по id.
    pub fn apply<R: Filterable>(&self, base: impl IntoIterator<Item = R>) -> Vec<R> {
        let mut seen = HashSet::new();
        base.into_iter()
            .filter(|record| self.matches(record))
            .filter(|record| seen.insert(record.id()))
            .collect()
    }
}

/// Разбор и применение за один шаг.
pub fn compose<R: Filterable>(
    base: impl IntoIterator<Item = R>,
    recognized: &[FilterKey],
    raw: &HashMap<String, String>,
) -> Result<Vec<R>, FilterError> {
    Ok(FilterSet::parse(recognized, raw)?.apply(base))
}

fn parse_ids(key: FilterKey, value: &str) -> Result<BTreeSet<i64>, FilterError> {
    value
        .split(',')
        .map(|token| {
            token.trim().parse::<i64>().map_err(|_| FilterError::MalformedId {
                key: key.param(),
                token: token.to_string(),
            })
        })
        .collect()
}
