//! Row types for the schedule tables published by the data site.

use serde::Deserialize;

use super::ScheduleTable;
use crate::event::Category;

/// Zodiac names used for clan battle periods, starting from Aquarius
const CONSTELLATIONS: [&str; 12] = [
    "水瓶", "双鱼", "白羊", "金牛", "双子", "巨蟹", "狮子", "处女", "天秤", "天蝎", "射手", "摩羯",
];

/// Shift between a clan battle's number and its constellation
const CONSTELLATION_OFFSET: i64 = 1;

/// Clan battle ids are numbered from this base
const CLAN_BATTLE_ID_BASE: i64 = 1000;

/// Columns every schedule row carries
#[derive(Debug, Clone, Deserialize)]
pub struct RowSpan {
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClanBattleRow {
    pub clan_battle_id: i64,
    #[serde(flatten)]
    pub span: RowSpan,
}

impl ScheduleTable for ClanBattleRow {
    const NAME: &'static str = "clan_battle_period";
    const CATEGORY: Category = Category::ClanBattle;
    const QUERY: &'static str = "
        SELECT clan_battle_id, start_time, end_time
        FROM clan_battle_period";

    fn row_id(&self) -> i64 {
        self.clan_battle_id
    }

    fn span(&self) -> &RowSpan {
        &self.span
    }

    fn title(&self) -> Option<String> {
        let number = self.clan_battle_id - CLAN_BATTLE_ID_BASE;
        let index = (number + CONSTELLATION_OFFSET).rem_euclid(CONSTELLATIONS.len() as i64);
        Some(format!("第{}期{}座团队战", number, CONSTELLATIONS[index as usize]))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeGachaRow {
    pub id: i64,
    #[serde(default)]
    pub freegacha_1: i64,
    #[serde(default)]
    pub freegacha_10: i64,
    #[serde(flatten)]
    pub span: RowSpan,
}

impl ScheduleTable for FreeGachaRow {
    const NAME: &'static str = "campaign_freegacha";
    const CATEGORY: Category = Category::FreeGacha;
    const QUERY: &'static str = "
        SELECT id, start_time, end_time, freegacha_1, freegacha_10
        FROM campaign_freegacha
        WHERE freegacha_10 = 1 OR freegacha_1 = 1";

    fn row_id(&self) -> i64 {
        self.id
    }

    fn span(&self) -> &RowSpan {
        &self.span
    }

    fn title(&self) -> Option<String> {
        match (self.freegacha_1, self.freegacha_10) {
            (1, 1) => None,
            (1, _) => Some("每日一次 免费单抽活动".to_string()),
            (_, 1) => Some("每日一次 免费十连活动".to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignRow {
    pub id: i64,
    pub campaign_category: i64,
    /// Multiplier in thousandths (1500 means x1.5)
    pub value: i64,
    #[serde(flatten)]
    pub span: RowSpan,
}

impl ScheduleTable for CampaignRow {
    const NAME: &'static str = "campaign_schedule";
    const CATEGORY: Category = Category::Campaign;
    const QUERY: &'static str = "
        SELECT id, start_time, end_time, campaign_category, CAST(value AS INTEGER) AS value
        FROM campaign_schedule";

    fn row_id(&self) -> i64 {
        self.id
    }

    fn span(&self) -> &RowSpan {
        &self.span
    }

    fn title(&self) -> Option<String> {
        campaign_title(self.campaign_category, self.value)
    }
}

/// Title for a campaign kind and multiplier; `None` for kinds we don't publish
pub fn campaign_title(category: i64, value: i64) -> Option<String> {
    let (prefix, suffix) = match category {
        31 => ("「普通关卡」掉落量", "倍庆典"),
        32 => ("「困难关卡」掉落量", "倍庆典"),
        37 => ("「圣迹调查」掉落量", "倍庆典"),
        38 => ("「神殿调查」掉落量", "倍庆典"),
        44 => ("「探索」掉落量", "倍庆典"),
        45 => ("「地下城」玛那", "倍庆典"),
        131 => ("「活动关卡（普通）」掉落量", "倍庆典"),
        132 => ("「活动关卡（困难）」掉落量", "倍庆典"),
        151 => ("「活动关卡」玩家经验值获得量", "倍"),
        91 => ("大师币", "倍"),
        39 => ("VH图", "倍"),
        _ => return None,
    };

    let ratio = if value % 1000 == 0 {
        (value / 1000).to_string()
    } else {
        format!("{:.1}", value as f64 / 1000.0)
    };

    Some(format!("{prefix}{ratio}{suffix}"))
}

/// `max_floor_num` is joined in from `tower_area_data`
#[derive(Debug, Clone, Deserialize)]
pub struct TowerRow {
    pub tower_schedule_id: i64,
    pub max_floor_num: i64,
    #[serde(flatten)]
    pub span: RowSpan,
}

impl ScheduleTable for TowerRow {
    const NAME: &'static str = "tower_schedule";
    const CATEGORY: Category = Category::Tower;
    // The floor count lives on the schedule's last tower area
    const QUERY: &'static str = "
        SELECT s.tower_schedule_id AS tower_schedule_id, s.start_time AS start_time,
               s.end_time AS end_time, a.max_floor_num AS max_floor_num
        FROM tower_schedule AS s
        INNER JOIN tower_area_data AS a ON a.tower_area_id = s.max_tower_area_id";

    fn row_id(&self) -> i64 {
        self.tower_schedule_id
    }

    fn span(&self) -> &RowSpan {
        &self.span
    }

    fn title(&self) -> Option<String> {
        Some(format!("露娜之塔 {}层", self.max_floor_num))
    }
}

/// Story events; `title` is joined in from `event_story_data`
#[derive(Debug, Clone, Deserialize)]
pub struct HatsuneRow {
    pub event_id: i64,
    pub title: String,
    #[serde(flatten)]
    pub span: RowSpan,
}

impl ScheduleTable for HatsuneRow {
    const NAME: &'static str = "hatsune_schedule";
    const CATEGORY: Category = Category::StoryEvent;
    const QUERY: &'static str = "
        SELECT h.event_id AS event_id, h.start_time AS start_time,
               h.end_time AS end_time, d.title AS title
        FROM hatsune_schedule AS h
        INNER JOIN event_story_data AS d ON d.value = h.event_id";

    fn row_id(&self) -> i64 {
        self.event_id
    }

    fn span(&self) -> &RowSpan {
        &self.span
    }

    fn title(&self) -> Option<String> {
        Some(format!("剧情活动：{}", self.title))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharaFortuneRow {
    pub fortune_id: i64,
    pub name: String,
    #[serde(flatten)]
    pub span: RowSpan,
}

impl ScheduleTable for CharaFortuneRow {
    const NAME: &'static str = "chara_fortune_schedule";
    const CATEGORY: Category = Category::CharaFortune;
    const QUERY: &'static str = "
        SELECT fortune_id, start_time, end_time, name
        FROM chara_fortune_schedule";

    fn row_id(&self) -> i64 {
        self.fortune_id
    }

    fn span(&self) -> &RowSpan {
        &self.span
    }

    fn title(&self) -> Option<String> {
        Some(self.name.clone())
    }

    // Older database versions store these times with minute precision
    // ("2020/7/11 5:00"); widen them to cover the whole minute.
    fn times(&self) -> (String, String) {
        let span = &self.span;
        let minute_precision = span
            .start_time
            .split_whitespace()
            .nth(1)
            .is_some_and(|time| time.len() <= "05:00".len());

        if minute_precision {
            (format!("{}:00", span.start_time), format!("{}:59", span.end_time))
        } else {
            (span.start_time.clone(), span.end_time.clone())
        }
    }
}
