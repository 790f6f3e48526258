//! End-to-end ranking against mocked forecast and condition backends.

use std::sync::Arc;
use std::time::Duration;

use edge_weather::{
    parse_courses, Coordinate, HttpConditionSource, OpenMeteoSource, ProximityCache, Ranker,
    RankingBoard, StaticForecastSource,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COURSES: &str = "id,name,numHoles,lat,lon
1,Pier Park,18,45.50,-122.60
2,Glendoveer,18,45.52,-122.62
3,Blue Lake,18,45.54,-122.58
4,Dabney,9,45.51,-122.61
5,Milo McIver,27,45.20,-122.60
";

fn forecast_body(precip_mm: f64) -> serde_json::Value {
    let time: Vec<String> = (0..24).map(|h| format!("2024-07-01T{:02}:00", h)).collect();
    serde_json::json!({
        "latitude": 45.5,
        "longitude": -122.5,
        "hourly": {
            "time": time,
            "temperature_2m": vec![68.0; 24],
            "precipitation_probability": vec![if precip_mm > 0.0 { 100 } else { 0 }; 24],
            "precipitation": vec![precip_mm; 24],
            "windspeed_10m": vec![6.0; 24]
        }
    })
}

#[tokio::test]
async fn test_rank_fetches_once_per_cluster() {
    let forecast_server = MockServer::start().await;
    let condition_server = MockServer::start().await;

    // Milo McIver sits about 20 miles south of the others and gets rain.
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "45.2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(3.0)))
        .expect(1)
        .mount(&forecast_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(0.0)))
        .expect(1)
        .mount(&forecast_server)
        .await;

    // One bulk request for the four 18+ hole venues; nothing per venue.
    Mock::given(method("GET"))
        .and(path("/api/courses/bulk"))
        .and(query_param("ids", "1,2,3,5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "1": { "ratings": {}, "conditions": null },
            "2": { "ratings": { "quality": 4.1 }, "conditions": null },
            "3": {
                "ratings": { "quality": 2.5 },
                "conditions": { "rating": 1, "description": "Flooded" }
            },
            "5": { "ratings": {}, "conditions": null }
        })))
        .expect(1)
        .mount(&condition_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&condition_server)
        .await;

    let forecasts = OpenMeteoSource::new(
        &format!("{}/v1/forecast", forecast_server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();
    let conditions =
        HttpConditionSource::new(&condition_server.uri(), Duration::from_secs(5)).unwrap();
    let fallback = StaticForecastSource::bundled().unwrap().series().clone();
    let cache = Arc::new(ProximityCache::new(10.0, fallback));

    let ranker = Ranker::new(cache, Arc::new(forecasts), Arc::new(conditions)).with_min_holes(18);
    let venues = parse_courses(COURSES);
    assert_eq!(venues.len(), 5);

    let user = Coordinate::new(45.52, -122.65).unwrap();
    let ranking = ranker.rank(&venues, user, 10, 10).await.unwrap();

    let ids: Vec<u32> = ranking.entries.iter().map(|e| e.course.id).collect();
    // Dry venues nearest first, then the flooded one, then the rainy one.
    assert_eq!(ids, vec![2, 1, 3, 5]);
    assert!(ranking.entries[2].score.overall < 1.5);
    assert!(ranking.entries[3].score.overall < ranking.entries[2].score.overall);
    assert_eq!(ranking.entries[0].ratings.get("quality"), Some(&4.1));
    assert_eq!(ranking.entries[2].ratings.get("quality"), Some(&2.5));
    // One slot for the northern cluster, one for McIver.
    assert_eq!(ranker.cache().len(), 2);

    let board = RankingBoard::new();
    assert!(board.publish(ranking));

    // A second pass is served from both session caches.
    let again = ranker.rank(&venues, user, 10, 10).await.unwrap();
    let again_ids: Vec<u32> = again.entries.iter().map(|e| e.course.id).collect();
    assert_eq!(again_ids, ids);
    assert!(board.publish(again));
}
