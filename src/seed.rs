use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{info, warn};

use crate::{
    accounts::Accounts,
    catalog::Catalog,
    config::AdminSeed,
    entities::{emotion, film},
    error::AppResult,
    models::{EmotionInput, FilmInput, Genre, RatingInput},
};

struct EmotionSeed {
    name: &'static str,
    description: &'static str,
    color: &'static str,
    icon: &'static str,
}

const EMOTIONS: &[EmotionSeed] = &[
    EmotionSeed { name: "Joy", description: "Happiness, fun and delight", color: "#FFD166", icon: "fa-laugh" },
    EmotionSeed { name: "Sadness", description: "Sorrow, longing and melancholy", color: "#118AB2", icon: "fa-frown" },
    EmotionSeed { name: "Fear", description: "Danger, anxiety and horror", color: "#073B4C", icon: "fa-grimace" },
    EmotionSeed { name: "Anger", description: "Irritation, rage and fury", color: "#FF6B6B", icon: "fa-angry" },
    EmotionSeed { name: "Surprise", description: "The unexpected and the astonishing", color: "#4ECDC4", icon: "fa-flushed" },
    EmotionSeed { name: "Love", description: "Affection, tenderness and passion", color: "#EF476F", icon: "fa-heart" },
    EmotionSeed { name: "Suspense", description: "Anxious anticipation", color: "#7209B7", icon: "fa-grimace" },
    EmotionSeed { name: "Inspiration", description: "Uplift and motivation", color: "#06D6A0", icon: "fa-star" },
    EmotionSeed { name: "Nostalgia", description: "Longing for the past", color: "#FF9E6D", icon: "fa-history" },
    EmotionSeed { name: "Empathy", description: "Compassion for others", color: "#A78BFA", icon: "fa-hands-helping" },
    EmotionSeed { name: "Triumph", description: "Victory and success", color: "#FFD700", icon: "fa-trophy" },
];

struct FilmSeed {
    title: &'static str,
    year: i32,
    duration: i32,
    country: &'static str,
    director: &'static str,
    genre: Genre,
    poster: &'static str,
    description: &'static str,
    ratings: &'static [(&'static str, i32)],
}

const FILMS: &[FilmSeed] = &[
    FilmSeed {
        title: "Interstellar",
        year: 2014,
        duration: 169,
        country: "USA",
        director: "Christopher Nolan",
        genre: Genre::SciFi,
        poster: "films/posters/interstellar.jpg",
        description: "With Earth failing, a team of explorers travels through a wormhole in search of a new home for humanity.",
        ratings: &[("Inspiration", 9), ("Sadness", 7), ("Surprise", 8), ("Love", 8), ("Suspense", 7)],
    },
    FilmSeed {
        title: "The Intouchables",
        year: 2011,
        duration: 112,
        country: "France",
        director: "Olivier Nakache",
        genre: Genre::Drama,
        poster: "films/posters/intouchables.jpg",
        description: "A wealthy quadriplegic aristocrat hires a young man from the projects as his live-in carer.",
        ratings: &[("Joy", 9), ("Inspiration", 9), ("Empathy", 8), ("Love", 7)],
    },
    FilmSeed {
        title: "The Shawshank Redemption",
        year: 1994,
        duration: 142,
        country: "USA",
        director: "Frank Darabont",
        genre: Genre::Drama,
        poster: "films/posters/shawshank.jpg",
        description: "A banker sentenced to life in Shawshank prison holds on to hope over two decades.",
        ratings: &[("Inspiration", 10), ("Suspense", 8), ("Triumph", 9), ("Sadness", 7)],
    },
    FilmSeed {
        title: "The Gentlemen",
        year: 2019,
        duration: 113,
        country: "USA",
        director: "Guy Ritchie",
        genre: Genre::Thriller,
        poster: "films/posters/gentlemen.jpg",
        description: "An American expat tries to sell off his marijuana empire in London, setting off a chain of schemes.",
        ratings: &[("Surprise", 8), ("Suspense", 7), ("Joy", 6)],
    },
    FilmSeed {
        title: "The Green Mile",
        year: 1999,
        duration: 189,
        country: "USA",
        director: "Frank Darabont",
        genre: Genre::Drama,
        poster: "films/posters/green_mile.jpg",
        description: "A death row guard discovers that one of his prisoners has a miraculous gift.",
        ratings: &[("Sadness", 9), ("Empathy", 9), ("Inspiration", 8), ("Suspense", 7)],
    },
    FilmSeed {
        title: "Shutter Island",
        year: 2009,
        duration: 138,
        country: "USA",
        director: "Martin Scorsese",
        genre: Genre::Thriller,
        poster: "films/posters/shutter_island.jpg",
        description: "Two marshals investigate a disappearance at an island hospital for the criminally insane.",
        ratings: &[("Fear", 8), ("Suspense", 9), ("Surprise", 8)],
    },
    FilmSeed {
        title: "Forrest Gump",
        year: 1994,
        duration: 142,
        country: "USA",
        director: "Robert Zemeckis",
        genre: Genre::Drama,
        poster: "films/posters/forrest_gump.jpg",
        description: "A kind-hearted man drifts through decades of American history while loving one woman.",
        ratings: &[("Joy", 8), ("Sadness", 7), ("Inspiration", 9), ("Nostalgia", 8)],
    },
    FilmSeed {
        title: "The Lord of the Rings: The Return of the King",
        year: 2003,
        duration: 201,
        country: "New Zealand",
        director: "Peter Jackson",
        genre: Genre::Fantasy,
        poster: "films/posters/return_of_the_king.jpg",
        description: "The final battle for Middle-earth begins as Frodo nears Mount Doom.",
        ratings: &[("Triumph", 9), ("Inspiration", 9), ("Suspense", 8), ("Sadness", 6)],
    },
    FilmSeed {
        title: "Fight Club",
        year: 1999,
        duration: 139,
        country: "USA",
        director: "David Fincher",
        genre: Genre::Thriller,
        poster: "films/posters/fight_club.jpg",
        description: "An insomniac office worker and a soap maker form an underground fight club.",
        ratings: &[("Anger", 8), ("Surprise", 9), ("Suspense", 8)],
    },
    FilmSeed {
        title: "Terminator 2: Judgment Day",
        year: 1991,
        duration: 137,
        country: "USA",
        director: "James Cameron",
        genre: Genre::SciFi,
        poster: "films/posters/terminator_2.jpg",
        description: "A reprogrammed cyborg protects a boy destined to lead humanity against the machines.",
        ratings: &[("Suspense", 9), ("Inspiration", 7), ("Triumph", 8)],
    },
    FilmSeed {
        title: "Green Book",
        year: 2018,
        duration: 130,
        country: "USA",
        director: "Peter Farrelly",
        genre: Genre::Drama,
        poster: "films/posters/green_book.jpg",
        description: "A bouncer drives a classical pianist on a concert tour through the 1960s Deep South.",
        ratings: &[("Joy", 8), ("Empathy", 9), ("Inspiration", 8)],
    },
    FilmSeed {
        title: "Spirited Away",
        year: 2001,
        duration: 124,
        country: "Japan",
        director: "Hayao Miyazaki",
        genre: Genre::Animation,
        poster: "films/posters/spirited_away.jpg",
        description: "A girl wanders into a world of spirits and must work in a bathhouse to free her parents.",
        ratings: &[("Surprise", 9), ("Fear", 6), ("Inspiration", 8)],
    },
];

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SeedReport {
    pub emotions_created: usize,
    pub emotions_updated: usize,
    pub films_created: usize,
    pub films_updated: usize,
}

/// Creates the staff account and upserts the base emotions and the starter
/// catalog. Emotions match by name and films by (title, year), so running it
/// again updates rows in place.
pub async fn load_initial_data(
    catalog: &Catalog,
    accounts: &Accounts,
    admin: Option<&AdminSeed>,
) -> AppResult<SeedReport> {
    let mut report = SeedReport::default();

    let staff_id = match admin {
        Some(admin) => {
            let staff = accounts.ensure_staff(&admin.username, &admin.email, &admin.password).await?;
            info!(username = %staff.username, "staff account ready");
            Some(staff.id)
        },
        None => {
            warn!("ADMIN_USERNAME/ADMIN_PASSWORD/ADMIN_EMAIL not set, skipping staff account");
            None
        },
    };

    for seed in EMOTIONS {
        let input = EmotionInput {
            name: seed.name.to_string(),
            slug: None,
            description: seed.description.to_string(),
            color: seed.color.to_string(),
            icon: seed.icon.to_string(),
            is_active: true,
        };
        let existing = emotion::Entity::find()
            .filter(emotion::Column::Name.eq(seed.name))
            .one(catalog.db())
            .await?;
        match existing {
            Some(existing) => {
                catalog.update_emotion(existing.id, input).await?;
                report.emotions_updated += 1;
            },
            None => {
                catalog.create_emotion(input).await?;
                report.emotions_created += 1;
            },
        }
    }

    for seed in FILMS {
        let input = film_input(catalog, seed).await?;
        let existing = film::Entity::find()
            .filter(film::Column::Title.eq(seed.title))
            .filter(film::Column::Year.eq(seed.year))
            .one(catalog.db())
            .await?;
        match existing {
            Some(existing) => {
                catalog.update_film(existing.id, input, staff_id).await?;
                report.films_updated += 1;
            },
            None => {
                catalog.create_film(input, staff_id).await?;
                report.films_created += 1;
            },
        }
    }

    info!(
        emotions_created = report.emotions_created,
        emotions_updated = report.emotions_updated,
        films_created = report.films_created,
        films_updated = report.films_updated,
        "initial data loaded"
    );
    Ok(report)
}

async fn film_input(catalog: &Catalog, seed: &FilmSeed) -> AppResult<FilmInput> {
    let mut ratings = Vec::with_capacity(seed.ratings.len());
    for &(name, intensity) in seed.ratings {
        let found = emotion::Entity::find().filter(emotion::Column::Name.eq(name)).one(catalog.db()).await?;
        match found {
            Some(emotion) => {
                ratings.push(RatingInput { emotion_id: emotion.id, intensity, description: String::new() })
            },
            None => warn!(film = seed.title, emotion = name, "unknown emotion in seed data"),
        }
    }

    Ok(FilmInput {
        title: seed.title.to_string(),
        original_title: seed.title.to_string(),
        description: seed.description.to_string(),
        year: seed.year,
        duration: seed.duration,
        poster: Some(seed.poster.to_string()),
        trailer_url: String::new(),
        country: seed.country.to_string(),
        director: seed.director.to_string(),
        genre: seed.genre,
        is_published: true,
        ratings,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dispatcher::{DispatchSettings, Dispatcher},
        entities::{film_emotion_rating, user},
        test_support::{self, RecordingMailer},
    };

    #[tokio::test]
    async fn seeding_twice_updates_in_place() {
        let db = test_support::db().await;
        let dispatcher = Dispatcher::new(
            db.clone(),
            Arc::new(RecordingMailer::default()),
            DispatchSettings { from_email: "noreply@moviemood.test".into(), site_host: "localhost".into() },
        );
        let catalog = Catalog::new(db.clone(), dispatcher);
        let accounts = Accounts::new(db.clone(), 14, 4);
        let admin = AdminSeed {
            username: "admin".into(),
            password: "admin password".into(),
            email: "admin@example.com".into(),
        };

        let first = load_initial_data(&catalog, &accounts, Some(&admin)).await.unwrap();
        assert_eq!(first.emotions_created, EMOTIONS.len());
        assert_eq!(first.films_created, FILMS.len());

        let second = load_initial_data(&catalog, &accounts, Some(&admin)).await.unwrap();
        assert_eq!(second.emotions_updated, EMOTIONS.len());
        assert_eq!(second.films_updated, FILMS.len());
        assert_eq!(second.films_created, 0);

        assert_eq!(film::Entity::find().all(&db).await.unwrap().len(), FILMS.len());
        let rating_rows: usize = FILMS.iter().map(|f| f.ratings.len()).sum();
        assert_eq!(film_emotion_rating::Entity::find().all(&db).await.unwrap().len(), rating_rows);

        let staff = user::Entity::find().all(&db).await.unwrap();
        assert_eq!(staff.len(), 1);
        assert!(staff[0].is_staff);

        let interstellar = film::Entity::find()
            .filter(film::Column::Title.eq("Interstellar"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(interstellar.rating, 7.8);
        assert_eq!(interstellar.created_by, Some(staff[0].id));
    }

    #[test]
    fn seed_ratings_reference_seeded_emotions() {
        for film in FILMS {
            for (name, intensity) in film.ratings {
                assert!(EMOTIONS.iter().any(|e| e.name == *name), "{name} in {}", film.title);
                assert!((1..=10).contains(intensity));
            }
        }
    }
}
