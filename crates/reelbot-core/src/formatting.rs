//! User-facing texts (Telegram HTML).

use crate::{
    download::{error::truncate_chars, ClassifiedError},
    telemetry::UsageStats,
};

/// Error texts in the stats summary are cut to this many characters.
const STATS_ERROR_CHARS: usize = 60;

pub const DOWNLOADING: &str = "⏳ Скачиваю видео...";
pub const INTERNAL_ERROR: &str = "❌ Произошла ошибка при обработке запроса.";
pub const STATS_LOADING: &str = "📊 Получаю статистику...";
pub const STATS_UNAVAILABLE: &str =
    "❌ Не удалось получить статистику.\nПроверьте настройки Google Sheets API.";
pub const STATS_FAILED: &str = "❌ Произошла ошибка при получении статистики.";

pub const START_MESSAGE: &str = "👋 Привет! Я бот для скачивания видео из Instagram и TikTok.\n\n\
Просто отправь мне ссылку на Instagram Reels или TikTok видео, и я скачаю его для тебя.\n\n\
Также можешь добавить меня в группу или канал - я буду автоматически скачивать все видео из отправленных ссылок.\n\n\
Используй /help для получения дополнительной информации.";

pub const HELP_MESSAGE: &str = "ℹ️ <b>Как использовать бота:</b>\n\n\
<b>Вариант 1: Личный чат</b>\n\
Просто отправьте мне ссылку на Instagram Reels или TikTok видео, и я скачаю его для вас.\n\n\
<b>Вариант 2: Группа или канал</b>\n\
1. Добавьте меня в группу или канал\n\
2. Убедитесь, что Privacy Mode отключен (см. @BotFather)\n\
3. Отправьте ссылку на видео\n\
4. Бот скачает видео и отправит его в ответ\n\n\
<b>Поддерживаемые ссылки:</b>\n\
• instagram.com/reel/...\n\
• instagram.com/p/...\n\
• instagram.com/tv/...\n\
• tiktok.com/@username/video/...\n\
• vm.tiktok.com/...\n\
• vt.tiktok.com/...\n\n\
<b>Примечание:</b> Работает только с публичным контентом.";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Text shown in place of the status message when a download fails.
pub fn user_error_message(err: &ClassifiedError) -> String {
    const PREFIX: &str = "❌ Не удалось скачать видео.";
    match err {
        ClassifiedError::RateLimited => {
            format!("{PREFIX} Платформа ограничила количество запросов, попробуйте позже.")
        }
        ClassifiedError::PrivateContent => {
            format!("{PREFIX} Это приватный контент.")
        }
        ClassifiedError::Unavailable => {
            format!("{PREFIX} Видео удалено или недоступно.")
        }
        ClassifiedError::AgeRestricted => {
            format!("{PREFIX} Видео имеет возрастные ограничения.")
        }
        ClassifiedError::LoginRequired => {
            format!("{PREFIX} Для просмотра требуется авторизация.")
        }
        ClassifiedError::GeoRestricted => {
            format!("{PREFIX} Видео недоступно в регионе сервера.")
        }
        ClassifiedError::Inappropriate => {
            format!("{PREFIX} Платформа пометила контент как неприемлемый.")
        }
        ClassifiedError::Unknown(raw) if raw.trim().is_empty() => {
            format!("{PREFIX} Возможно, контент недоступен или является приватным.")
        }
        ClassifiedError::Unknown(raw) => {
            format!("{PREFIX}\n\nОшибка yt-dlp:\n{}", escape_html(raw))
        }
    }
}

/// Render aggregated usage for the `/stats` command.
pub fn format_stats_message(stats: &UsageStats, window_days: u32) -> String {
    if stats.total == 0 {
        return "📊 <b>Статистика</b>\n\nНет данных за указанный период.".to_string();
    }

    let pct = |n: usize| n as f64 / stats.total as f64 * 100.0;

    let mut out = format!(
        "📊 <b>Статистика за последние {window_days} дней</b>\n\n\
📥 Всего запросов: {}\n\
✅ Успешно: {} ({:.1}%)\n\
❌ Ошибок: {} ({:.1}%)\n\n\
👥 Уникальных чатов: {}",
        group_thousands(stats.total),
        group_thousands(stats.success),
        pct(stats.success),
        group_thousands(stats.errors),
        pct(stats.errors),
        stats.unique_chats,
    );

    if !stats.top_error_types.is_empty() {
        out.push_str("\n\n🔝 <b>Типы ошибок:</b>");
        for (msg, count) in &stats.top_error_types {
            let short = if msg.chars().count() > STATS_ERROR_CHARS {
                format!("{}...", truncate_chars(msg, STATS_ERROR_CHARS))
            } else {
                msg.clone()
            };
            out.push_str(&format!("\n• {}: {count}", escape_html(&short)));
        }
    }

    if !stats.daily_breakdown.is_empty() {
        out.push_str(&format!(
            "\n\n📈 <b>По дням (последние {}):</b>",
            stats.daily_breakdown.len()
        ));
        for day in &stats.daily_breakdown {
            out.push_str(&format!(
                "\n{}: {} (✓{} ✗{})",
                day.date.format("%d.%m"),
                day.total,
                day.success,
                day.errors
            ));
        }
    }

    out
}

/// `1234567` -> `1,234,567`.
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::DailyStats;
    use chrono::NaiveDate;

    #[test]
    fn escape_html_basic() {
        assert_eq!(escape_html("<a&b>\""), "&lt;a&amp;b&gt;&quot;");
    }

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn empty_stats_render_placeholder() {
        assert_eq!(
            format_stats_message(&UsageStats::default(), 30),
            "📊 <b>Статистика</b>\n\nНет данных за указанный период."
        );
    }

    #[test]
    fn stats_message_lists_rates_errors_and_days() {
        let stats = UsageStats {
            total: 3,
            success: 2,
            errors: 1,
            unique_chats: 2,
            top_error_types: vec![("x".repeat(70), 1), ("<b>".to_string(), 1)],
            daily_breakdown: vec![DailyStats {
                date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                total: 3,
                success: 2,
                errors: 1,
            }],
        };
        let msg = format_stats_message(&stats, 30);

        assert!(msg.starts_with("📊 <b>Статистика за последние 30 дней</b>"));
        assert!(msg.contains("✅ Успешно: 2 (66.7%)"));
        assert!(msg.contains("❌ Ошибок: 1 (33.3%)"));
        assert!(msg.contains("👥 Уникальных чатов: 2"));
        assert!(msg.contains(&format!("• {}...: 1", "x".repeat(60))));
        assert!(msg.contains("• &lt;b&gt;: 1"));
        assert!(msg.contains("📈 <b>По дням (последние 1):</b>\n18.10: 3 (✓2 ✗1)"));
    }

    #[test]
    fn each_category_has_its_own_message() {
        let all = [
            ClassifiedError::RateLimited,
            ClassifiedError::PrivateContent,
            ClassifiedError::Unavailable,
            ClassifiedError::AgeRestricted,
            ClassifiedError::LoginRequired,
            ClassifiedError::GeoRestricted,
            ClassifiedError::Inappropriate,
            ClassifiedError::Unknown("boom".to_string()),
        ];
        let texts: std::collections::HashSet<String> = all.iter().map(user_error_message).collect();
        assert_eq!(texts.len(), all.len());
        for t in &texts {
            assert!(t.starts_with("❌ Не удалось скачать видео."));
        }
    }

    #[test]
    fn unknown_error_shows_escaped_raw_text() {
        let msg = user_error_message(&ClassifiedError::Unknown("ERROR: <bad> url".to_string()));
        assert!(msg.ends_with("Ошибка yt-dlp:\nERROR: &lt;bad&gt; url"));
    }
}
