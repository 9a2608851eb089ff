use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::{GameSetting, HourSetting, LoopLengthArg, WeatherSetting, LOCAL_LOCATION, MUSIC_DIR_ENV};
use crate::library::Variant;

#[derive(Parser, Debug, Clone)]
#[command(name = "kkjukebox")]
#[command(about = "Play music from your favorite Animal Crossing games")]
#[command(version)]
pub struct Args {
    /// Cut loop samples even if they already exist
    #[arg(long, global = true, env = "KKJUKEBOX_FORCE_CUT")]
    pub force_cut: bool,

    /// Peak-normalize newly cut loop samples
    #[arg(long, global = true, env = "KKJUKEBOX_NORMALIZE")]
    pub normalize: bool,

    /// Root directory of the music files
    #[arg(long, env = MUSIC_DIR_ENV)]
    pub music_dir: Option<PathBuf>,

    /// Directory holding hour_loop_times.json and kk_loop_times.json
    #[arg(long, env = "KKJUKEBOX_TIMINGS_DIR")]
    pub timings_dir: Option<PathBuf>,

    /// Output volume (0.0 to 1.0)
    #[arg(long, default_value = "1.0", env = "KKJUKEBOX_VOLUME")]
    pub volume: f32,

    /// Seed for reproducible random selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Play seamlessly-looping hourly music
    Hourly {
        /// Which game to source music from, or "random"
        #[arg(short, long, default_value = "new-horizons", value_parser = parse_game, env = "KKJUKEBOX_GAME")]
        game: GameSetting,

        /// Hour in 24-hour or AM/PM format, or "now" / "random"
        #[arg(short = 'H', long, default_value = "now", value_parser = parse_hour, env = "KKJUKEBOX_HOUR")]
        hour: HourSetting,

        /// Weather to source music for, or "random" / "location" for real-time weather
        #[arg(short, long, default_value = "location", value_parser = parse_weather, env = "KKJUKEBOX_WEATHER")]
        weather: WeatherSetting,

        /// Location for real-time weather; "local" looks it up by IP
        #[arg(short, long, default_value = LOCAL_LOCATION, env = "KKJUKEBOX_LOCATION")]
        location: String,
    },

    /// Play music from K.K. Slider
    Kk {
        /// How long a looping song plays before the next one, in seconds or "random"
        #[arg(long, value_parser = parse_loop_length, env = "KKJUKEBOX_LOOP_LENGTH")]
        loop_length: Option<LoopLengthArg>,

        /// Lower bound in seconds for a random loop length
        #[arg(long = "loop-length-lower-secs", default_value_t = 60, env = "KKJUKEBOX_LOOP_LENGTH_LOWER_SECS")]
        ll_lower: u64,

        /// Upper bound in seconds for a random loop length
        #[arg(long = "loop-length-upper-secs", default_value_t = 120, env = "KKJUKEBOX_LOOP_LENGTH_UPPER_SECS")]
        ll_upper: u64,

        /// Comma-separated variants: live, aircheck, musicbox
        #[arg(value_parser = parse_variants)]
        variants: VariantList,

        /// Song to play (fuzzy match); a setlist of every song when omitted
        song_name: Option<String>,
    },
}

/// One or more variants given as a single comma-separated value
#[derive(Debug, Clone, PartialEq)]
pub struct VariantList(pub Vec<Variant>);

fn parse_variants(s: &str) -> Result<VariantList, String> {
    let mut variants = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let variant: Variant = part.parse()?;
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    if variants.is_empty() {
        return Err("at least one variant is required".into());
    }
    Ok(VariantList(variants))
}

fn parse_game(s: &str) -> Result<GameSetting, String> {
    if s.eq_ignore_ascii_case("random") {
        return Ok(GameSetting::Random);
    }
    s.parse().map(GameSetting::Fixed)
}

fn parse_weather(s: &str) -> Result<WeatherSetting, String> {
    match s.to_lowercase().as_str() {
        "random" => Ok(WeatherSetting::Random),
        "location" => Ok(WeatherSetting::Location),
        _ => s.parse().map(WeatherSetting::Fixed),
    }
}

fn parse_loop_length(s: &str) -> Result<LoopLengthArg, String> {
    if s.eq_ignore_ascii_case("random") {
        return Ok(LoopLengthArg::Random);
    }
    s.trim()
        .parse()
        .map(LoopLengthArg::Secs)
        .map_err(|_| "value must be either an integer or \"random\"".to_string())
}

/// Parse "now", "random", 0-23, or a 12-hour "<1-12>AM|PM" value
pub fn parse_hour(s: &str) -> Result<HourSetting, String> {
    let value = s.trim().to_lowercase();
    match value.as_str() {
        "now" => return Ok(HourSetting::Now),
        "random" => return Ok(HourSetting::Random),
        _ => {}
    }

    if let Ok(hour) = value.parse::<i64>() {
        if hour < 0 || hour > 23 {
            return Err("hour value must be between 0 and 23".into());
        }
        return Ok(HourSetting::Fixed(hour as u8));
    }

    let (digits, pm) = if let Some(d) = value.strip_suffix("am") {
        (d, false)
    } else if let Some(d) = value.strip_suffix("pm") {
        (d, true)
    } else {
        return Err("could not parse hour value in 24-hour or AM/PM format".into());
    };

    let hour: u8 = digits
        .trim()
        .parse()
        .ok()
        .filter(|h| (1..=12).contains(h))
        .ok_or_else(|| "could not parse hour value in AM/PM format".to_string())?;

    Ok(HourSetting::Fixed(match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{Game, Weather};

    #[test]
    fn test_parse_hour() {
        assert_eq!(parse_hour("now").unwrap(), HourSetting::Now);
        assert_eq!(parse_hour("RANDOM").unwrap(), HourSetting::Random);
        assert_eq!(parse_hour("0").unwrap(), HourSetting::Fixed(0));
        assert_eq!(parse_hour("23").unwrap(), HourSetting::Fixed(23));
        assert_eq!(parse_hour("3PM").unwrap(), HourSetting::Fixed(15));
        assert_eq!(parse_hour("11am").unwrap(), HourSetting::Fixed(11));
        assert_eq!(parse_hour("12am").unwrap(), HourSetting::Fixed(0));
        assert_eq!(parse_hour("12PM").unwrap(), HourSetting::Fixed(12));
    }

    #[test]
    fn test_parse_hour_rejects_out_of_range() {
        assert!(parse_hour("24").is_err());
        assert!(parse_hour("-1").is_err());
        assert!(parse_hour("13pm").is_err());
        assert!(parse_hour("0am").is_err());
        assert!(parse_hour("noon").is_err());
    }

    #[test]
    fn test_parse_choices() {
        assert_eq!(parse_game("random").unwrap(), GameSetting::Random);
        assert_eq!(parse_game("wild-world").unwrap(), GameSetting::Fixed(Game::WildWorld));
        assert!(parse_game("pocket-camp").is_err());

        assert_eq!(parse_weather("location").unwrap(), WeatherSetting::Location);
        assert_eq!(parse_weather("sunny").unwrap(), WeatherSetting::Fixed(Weather::Sunny));

        assert_eq!(parse_loop_length("90").unwrap(), LoopLengthArg::Secs(90));
        assert_eq!(parse_loop_length("random").unwrap(), LoopLengthArg::Random);
        assert!(parse_loop_length("ninety").is_err());
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(
            parse_variants("aircheck, musicbox,aircheck").unwrap(),
            VariantList(vec![Variant::Aircheck, Variant::MusicBox])
        );
        assert!(parse_variants(",").is_err());
        assert!(parse_variants("studio").is_err());
    }

    #[test]
    fn test_kk_command_line() {
        let args = Args::parse_from(["kkjukebox", "kk", "live", "a yeti"]);
        match args.command {
            Command::Kk {
                variants,
                song_name,
                loop_length,
                ..
            } => {
                assert_eq!(variants, VariantList(vec![Variant::Live]));
                assert_eq!(song_name.as_deref(), Some("a yeti"));
                assert!(loop_length.is_none());
            }
            other => panic!("expected kk command, got {:?}", other),
        }
    }
}
