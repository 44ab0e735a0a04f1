// =============================================================================
// Riot Routing — platform and regional hosts
// =============================================================================
//
// Riot splits its API across two kinds of host:
//   - Platform hosts (na1, euw1, kr, ...) serve spectator data.
//   - Regional routing hosts (americas, asia, europe) serve accounts and
//     match history.
//
// Unknown platform codes fall back to NA1 / americas.
// =============================================================================

pub const AMERICAS_URL: &str = "https://americas.api.riotgames.com";
pub const ASIA_URL: &str = "https://asia.api.riotgames.com";
pub const EUROPE_URL: &str = "https://europe.api.riotgames.com";

const DEFAULT_PLATFORM_URL: &str = "https://na1.api.riotgames.com";

/// `(platform code, platform host, regional routing host)`
const PLATFORMS: &[(&str, &str, &str)] = &[
    ("NA1", "https://na1.api.riotgames.com", AMERICAS_URL),
    ("BR1", "https://br1.api.riotgames.com", AMERICAS_URL),
    ("LAN", "https://la1.api.riotgames.com", AMERICAS_URL),
    ("LA1", "https://la1.api.riotgames.com", AMERICAS_URL),
    ("LAS", "https://la2.api.riotgames.com", AMERICAS_URL),
    ("LA2", "https://la2.api.riotgames.com", AMERICAS_URL),
    ("OC1", "https://oc1.api.riotgames.com", AMERICAS_URL),
    ("KR", "https://kr.api.riotgames.com", ASIA_URL),
    ("JP1", "https://jp1.api.riotgames.com", ASIA_URL),
    ("PH2", "https://ph2.api.riotgames.com", ASIA_URL),
    ("SG2", "https://sg2.api.riotgames.com", ASIA_URL),
    ("TH2", "https://th2.api.riotgames.com", ASIA_URL),
    ("TW2", "https://tw2.api.riotgames.com", ASIA_URL),
    ("VN2", "https://vn2.api.riotgames.com", ASIA_URL),
    ("EUW1", "https://euw1.api.riotgames.com", EUROPE_URL),
    ("EUNE", "https://eun1.api.riotgames.com", EUROPE_URL),
    ("EUN1", "https://eun1.api.riotgames.com", EUROPE_URL),
    ("TR1", "https://tr1.api.riotgames.com", EUROPE_URL),
    ("RU", "https://ru.api.riotgames.com", EUROPE_URL),
];

fn lookup(platform: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    PLATFORMS
        .iter()
        .find(|(code, _, _)| code.eq_ignore_ascii_case(platform.trim()))
}

/// Whether `platform` is a known platform code.
pub fn is_known_platform(platform: &str) -> bool {
    lookup(platform).is_some()
}

/// Host for platform-scoped endpoints (spectator).
pub fn platform_url(platform: &str) -> &'static str {
    lookup(platform).map_or(DEFAULT_PLATFORM_URL, |(_, host, _)| host)
}

/// Host for region-scoped endpoints (accounts, match history).
pub fn regional_url(platform: &str) -> &'static str {
    lookup(platform).map_or(AMERICAS_URL, |(_, _, region)| region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_platforms_route_to_their_region() {
        assert_eq!(regional_url("NA1"), AMERICAS_URL);
        assert_eq!(regional_url("euw1"), EUROPE_URL);
        assert_eq!(regional_url("KR"), ASIA_URL);
        assert_eq!(platform_url("EUNE"), "https://eun1.api.riotgames.com");
        assert_eq!(platform_url("las"), "https://la2.api.riotgames.com");
    }

    #[test]
    fn unknown_platform_falls_back_to_na() {
        assert!(!is_known_platform("XX9"));
        assert_eq!(platform_url("XX9"), DEFAULT_PLATFORM_URL);
        assert_eq!(regional_url("XX9"), AMERICAS_URL);
    }
}
