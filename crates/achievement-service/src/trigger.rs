//! 触发标签与成就类型映射
//!
//! 用户行为以字符串标签（如 "REVIEW_SUBMITTED"）通知规则引擎，
//! 此映射决定一次触发需要评估哪些成就类型。未注册的标签评估全部类型。

use dashmap::DashMap;

use cinetrack_shared::events::triggers;

use crate::models::AchievementType;

pub struct TriggerMapping {
    mappings: DashMap<String, Vec<AchievementType>>,
}

impl TriggerMapping {
    /// 空映射，所有触发都评估全部类型
    pub fn empty() -> Self {
        Self {
            mappings: DashMap::new(),
        }
    }

    /// 内置映射：每个行为标签对应其计数类型
    pub fn with_defaults() -> Self {
        let mapping = Self::empty();
        mapping.add_mapping(triggers::REVIEW_SUBMITTED, [AchievementType::ReviewCount]);
        mapping.add_mapping(triggers::ITEM_WATCHED, [AchievementType::WatchCount]);
        mapping.add_mapping(triggers::WATCHLIST_ADDED, [AchievementType::WatchlistCount]);
        mapping.add_mapping(triggers::FAVORITE_ADDED, [AchievementType::FavoriteCount]);
        mapping
    }

    /// 注册或覆盖一个触发标签，类型按声明顺序去重保存
    pub fn add_mapping(
        &self,
        trigger: impl Into<String>,
        types: impl IntoIterator<Item = AchievementType>,
    ) {
        let mut types: Vec<_> = types.into_iter().collect();
        types.sort();
        types.dedup();
        self.mappings.insert(trigger.into(), types);
    }

    /// 触发标签需要评估的类型
    ///
    /// `MILESTONE_CHECK`、未注册标签以及映射为空的标签返回全部类型
    pub fn types_for(&self, trigger: &str) -> Vec<AchievementType> {
        if trigger == triggers::MILESTONE_CHECK {
            return AchievementType::ALL.to_vec();
        }
        match self.mappings.get(trigger) {
            Some(types) if !types.is_empty() => types.clone(),
            _ => AchievementType::ALL.to_vec(),
        }
    }

    pub fn is_registered(&self, trigger: &str) -> bool {
        self.mappings.contains_key(trigger)
    }
}

impl Default for TriggerMapping {
    fn default() -> Self {
        Self::with_defaults()
    }
}
