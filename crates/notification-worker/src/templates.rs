//! 通知文案模板
//!
//! 每种通知类别一组固定文案，标题保持简短便于客户端聚合同类通知。

use cinetrack_shared::events::{ItemType, MovieRef, SeriesRef, SeriesStatus};

/// 渲染后的标题与正文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub title: String,
    pub message: String,
}

impl Rendered {
    fn new(title: impl Into<String>, message: String) -> Self {
        Self {
            title: title.into(),
            message,
        }
    }
}

pub fn movie_released(movie: &MovieRef) -> Rendered {
    Rendered::new(
        "想看的电影上映了",
        format!("你想看的《{}》已经上映", movie.title),
    )
}

pub fn new_season(series: &SeriesRef, season: i32) -> Rendered {
    Rendered::new(
        "剧集新季上线",
        format!("《{}》第 {season} 季已上线", series.title),
    )
}

pub fn new_episode(series: &SeriesRef, season: i32, episode: i32) -> Rendered {
    Rendered::new(
        "剧集更新",
        format!("《{}》第 {season} 季第 {episode} 集已更新", series.title),
    )
}

pub fn status_changed(series: &SeriesRef, old_status: SeriesStatus) -> Rendered {
    Rendered::new(
        "剧集状态变化",
        format!(
            "《{}》从「{}」变为「{}」",
            series.title,
            old_status.label(),
            series.status.label()
        ),
    )
}

/// 想看清单 / 收藏中的条目有新影评
pub fn item_reviewed(
    item_title: &str,
    item_type: ItemType,
    rating: Option<i16>,
    favorite: bool,
) -> Rendered {
    let noun = match item_type {
        ItemType::Movie => "电影",
        ItemType::Series => "剧集",
    };
    let source = if favorite { "收藏的" } else { "想看的" };
    let message = match rating {
        Some(rating) => format!("你{source}{noun}《{item_title}》有一条 {rating} 分的新影评"),
        None => format!("你{source}{noun}《{item_title}》有一条新影评"),
    };
    Rendered::new("新影评", message)
}

pub fn achievement_unlocked(name: &str, description: &str) -> Rendered {
    let message = if description.is_empty() {
        format!("你解锁了成就「{name}」")
    } else {
        format!("你解锁了成就「{name}」：{description}")
    };
    Rendered::new("解锁新成就", message)
}
