//! Database repository for recipes.
//!
//! A recipe is stored across three tables: the `recipes` row itself, its `recipe_tags` links and
//! its `recipe_ingredients` lines. Writes touch all three inside one transaction; reads load the
//! rows first and then the links for the whole page with two `ANY($1)` queries.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        recipes::{
            CartIngredientLine, RecipeCreateDBRequest, RecipeDBResponse, RecipeIngredientDBResponse,
            RecipeIngredientInput, RecipeRow, RecipeUpdateDBRequest,
        },
        tags::TagDBResponse,
    },
};
use crate::types::{RecipeId, TagId, UserId};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing recipes
///
/// All criteria are combined with AND; tag slugs match if the recipe carries any of them.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author_id: Option<UserId>,
    pub tag_slugs: Vec<String>,
    /// Only recipes this user has favorited
    pub favorited_by: Option<UserId>,
    /// Only recipes in this user's shopping cart
    pub in_cart_of: Option<UserId>,
    pub skip: i64,
    pub limit: i64,
}

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.created_at";

const FILTER_CLAUSE: &str = r#"
    ($1::bigint IS NULL OR r.author_id = $1)
    AND (cardinality($2::text[]) = 0 OR EXISTS (
        SELECT 1 FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = r.id AND t.slug = ANY($2)
    ))
    AND ($3::bigint IS NULL OR EXISTS (
        SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $3
    ))
    AND ($4::bigint IS NULL OR EXISTS (
        SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = $4
    ))
"#;

pub struct Recipes<'c> {
    db: &'c mut PgConnection,
}

/// Replace the tag and ingredient links of a recipe
async fn replace_links(
    conn: &mut PgConnection,
    recipe_id: RecipeId,
    tags: &[TagId],
    ingredients: &[RecipeIngredientInput],
) -> Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::bigint[])")
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut *conn)
        .await?;

    let ingredient_ids: Vec<i64> = ingredients.iter().map(|i| i.ingredient_id).collect();
    let amounts: Vec<i32> = ingredients.iter().map(|i| i.amount).collect();
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, ingredient_id, amount FROM UNNEST($2::bigint[], $3::int[]) AS lines (ingredient_id, amount)
        "#,
    )
    .bind(recipe_id)
    .bind(&ingredient_ids)
    .bind(&amounts)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl<'c> Repository for Recipes<'c> {
    type CreateRequest = RecipeCreateDBRequest;
    type UpdateRequest = RecipeUpdateDBRequest;
    type Response = RecipeDBResponse;
    type Id = RecipeId;
    type Filter = RecipeFilter;

    #[instrument(skip(self, request), fields(author_id = request.author_id, name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let recipe_id;
        {
            let mut tx = self.db.begin().await?;

            recipe_id = sqlx::query_scalar::<_, RecipeId>(
                r#"
                INSERT INTO recipes (author_id, name, image, text, cooking_time)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(request.author_id)
            .bind(&request.name)
            .bind(&request.image)
            .bind(&request.text)
            .bind(request.cooking_time)
            .fetch_one(&mut *tx)
            .await?;

            replace_links(&mut tx, recipe_id, &request.tags, &request.ingredients).await?;
            tx.commit().await?;
        }

        self.get_by_id(recipe_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match row {
            Some(row) => Ok(self.with_links(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<RecipeId>) -> Result<HashMap<Self::Id, RecipeDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, RecipeRow>(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = ANY($1)"))
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        let recipes = self.with_links(rows).await?;
        Ok(recipes.into_iter().map(|recipe| (recipe.id, recipe)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE {FILTER_CLAUSE} \
             ORDER BY r.created_at DESC, r.id DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.author_id)
        .bind(filter.tag_slugs.as_slice())
        .bind(filter.favorited_by)
        .bind(filter.in_cart_of)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        self.with_links(rows).await
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        {
            let mut tx = self.db.begin().await?;

            sqlx::query_scalar::<_, RecipeId>(
                r#"
                UPDATE recipes SET
                    name = $2,
                    text = $3,
                    cooking_time = $4,
                    image = COALESCE($5, image)
                WHERE id = $1
                RETURNING id
                "#,
            )
            .bind(id)
            .bind(&request.name)
            .bind(&request.text)
            .bind(request.cooking_time)
            .bind(&request.image)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

            replace_links(&mut tx, id, &request.tags, &request.ingredients).await?;
            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Recipes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Number of recipes matching the filter, ignoring `skip` and `limit`
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &RecipeFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM recipes r WHERE {FILTER_CLAUSE}"))
            .bind(filter.author_id)
            .bind(filter.tag_slugs.as_slice())
            .bind(filter.favorited_by)
            .bind(filter.in_cart_of)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Attach tags and ingredient lines to recipe rows, preserving row order
    async fn with_links(&mut self, rows: Vec<RecipeRow>) -> Result<Vec<RecipeDBResponse>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<RecipeId> = rows.iter().map(|r| r.id).collect();

        let tag_rows = sqlx::query_as::<_, (RecipeId, TagId, String, String)>(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.slug
            FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(ids.as_slice())
        .fetch_all(&mut *self.db)
        .await?;

        let mut tags: HashMap<RecipeId, Vec<TagDBResponse>> = HashMap::new();
        for (recipe_id, id, name, slug) in tag_rows {
            tags.entry(recipe_id).or_default().push(TagDBResponse { id, name, slug });
        }

        let ingredient_rows = sqlx::query_as::<_, RecipeIngredientDBResponse>(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.id
            "#,
        )
        .bind(ids.as_slice())
        .fetch_all(&mut *self.db)
        .await?;

        let mut ingredients: HashMap<RecipeId, Vec<RecipeIngredientDBResponse>> = HashMap::new();
        for line in ingredient_rows {
            ingredients.entry(line.recipe_id).or_default().push(line);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                RecipeDBResponse::from_parts(
                    row,
                    tags.remove(&id).unwrap_or_default(),
                    ingredients.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    /// Newest recipes of each author, at most `limit` per author when given
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn previews_for_authors(
        &mut self,
        author_ids: &[UserId],
        limit: Option<i64>,
    ) -> Result<HashMap<UserId, Vec<RecipeRow>>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, author_id, name, image, text, cooking_time, created_at
            FROM (
                SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.created_at DESC, r.id DESC) AS position
                FROM recipes r
                WHERE r.author_id = ANY($1)
            ) ranked
            WHERE $2::bigint IS NULL OR position <= $2
            ORDER BY author_id, position
            "#,
        )
        .bind(author_ids)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        let mut previews: HashMap<UserId, Vec<RecipeRow>> = HashMap::new();
        for row in rows {
            previews.entry(row.author_id).or_default().push(row);
        }
        Ok(previews)
    }

    /// Total recipes per author. Authors without recipes are absent from the map.
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn count_for_authors(&mut self, author_ids: &[UserId]) -> Result<HashMap<UserId, i64>> {
        let counts = sqlx::query_as::<_, (UserId, i64)>(
            "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
        )
        .bind(author_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(counts.into_iter().collect())
    }

    /// Every ingredient line of every recipe in the user's shopping cart
    #[instrument(skip(self), err)]
    pub async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartIngredientLine>> {
        let lines = sqlx::query_as::<_, CartIngredientLine>(
            r#"
            SELECT i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
            FROM shopping_cart c
            INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
            ORDER BY ri.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{RecipeList, RecipeLists};
    use crate::test_utils::{create_test_ingredients, create_test_user, seeded_tags};
    use sqlx::PgPool;

    fn recipe_create(author_id: UserId, name: &str, tags: Vec<TagId>, ingredients: Vec<(i64, i32)>) -> RecipeCreateDBRequest {
        RecipeCreateDBRequest {
            author_id,
            name: name.to_string(),
            text: "Mix and bake.".to_string(),
            image: "recipes/images/test.png".to_string(),
            cooking_time: 30,
            tags,
            ingredients: ingredients
                .into_iter()
                .map(|(ingredient_id, amount)| RecipeIngredientInput { ingredient_id, amount })
                .collect(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_recipe(pool: PgPool) {
        let author = create_test_user(&pool, "baker").await;
        let tags = seeded_tags(&pool).await;
        let ingredients = create_test_ingredients(&pool, &[("flour", "g"), ("sugar", "g")]).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Recipes::new(&mut conn);

        let created = repo
            .create(&recipe_create(
                author.id,
                "Cake",
                vec![tags[2].id, tags[0].id],
                vec![(ingredients[1].id, 100), (ingredients[0].id, 200)],
            ))
            .await
            .unwrap();

        assert_eq!(created.name, "Cake");
        assert_eq!(created.author_id, author.id);
        // Tags come back in id order, ingredient lines in insertion order
        assert_eq!(created.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![tags[0].id, tags[2].id]);
        assert_eq!(created.ingredients[0].name, "sugar");
        assert_eq!(created.ingredients[0].amount, 100);
        assert_eq!(created.ingredients[1].name, "flour");

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.ingredients, created.ingredients);
        assert!(repo.get_by_id(created.id + 1000).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cooking_time_out_of_range_is_rejected(pool: PgPool) {
        let author = create_test_user(&pool, "baker").await;
        let tags = seeded_tags(&pool).await;
        let ingredients = create_test_ingredients(&pool, &[("flour", "g")]).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Recipes::new(&mut conn);

        let mut request = recipe_create(author.id, "Raw", vec![tags[0].id], vec![(ingredients[0].id, 1)]);
        request.cooking_time = 0;
        let err = repo.create(&request).await.unwrap_err();
        assert!(err.is_check_violation_of("recipes_cooking_time_range"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_replaces_links(pool: PgPool) {
        let author = create_test_user(&pool, "baker").await;
        let tags = seeded_tags(&pool).await;
        let ingredients = create_test_ingredients(&pool, &[("flour", "g"), ("eggs", "pcs")]).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Recipes::new(&mut conn);
        let created = repo
            .create(&recipe_create(author.id, "Bread", vec![tags[0].id], vec![(ingredients[0].id, 500)]))
            .await
            .unwrap();

        let updated = repo
            .update(
                created.id,
                &RecipeUpdateDBRequest {
                    name: "Omelette".to_string(),
                    text: "Whisk and fry.".to_string(),
                    image: None,
                    cooking_time: 5,
                    tags: vec![tags[1].id],
                    ingredients: vec![RecipeIngredientInput {
                        ingredient_id: ingredients[1].id,
                        amount: 3,
                    }],
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Omelette");
        assert_eq!(updated.cooking_time, 5);
        // Image kept when not supplied
        assert_eq!(updated.image, "recipes/images/test.png");
        assert_eq!(updated.tags, vec![tags[1].clone()]);
        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].name, "eggs");

        let missing = repo
            .update(
                created.id + 1000,
                &RecipeUpdateDBRequest {
                    name: "x".to_string(),
                    text: "x".to_string(),
                    image: None,
                    cooking_time: 1,
                    tags: vec![],
                    ingredients: vec![],
                },
            )
            .await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_order(pool: PgPool) {
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let tags = seeded_tags(&pool).await;
        let ingredients = create_test_ingredients(&pool, &[("flour", "g")]).await;
        let flour = ingredients[0].id;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Recipes::new(&mut conn);
        let breakfast = repo
            .create(&recipe_create(alice.id, "Pancakes", vec![tags[0].id], vec![(flour, 100)]))
            .await
            .unwrap();
        let lunch = repo
            .create(&recipe_create(alice.id, "Pie", vec![tags[1].id], vec![(flour, 300)]))
            .await
            .unwrap();
        let dinner = repo
            .create(&recipe_create(bob.id, "Pasta", vec![tags[2].id, tags[1].id], vec![(flour, 400)]))
            .await
            .unwrap();

        let all = RecipeFilter {
            limit: 10,
            ..Default::default()
        };
        let listed = repo.list(&all).await.unwrap();
        // Newest first
        assert_eq!(
            listed.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![dinner.id, lunch.id, breakfast.id]
        );
        assert_eq!(repo.count(&all).await.unwrap(), 3);

        let by_alice = RecipeFilter {
            author_id: Some(alice.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&by_alice).await.unwrap(), 2);

        // Tag slugs are OR-ed, and a recipe carrying both only appears once
        let tagged = RecipeFilter {
            tag_slugs: vec!["breakfast".to_string(), "lunch".to_string()],
            limit: 10,
            ..Default::default()
        };
        let listed = repo.list(&tagged).await.unwrap();
        assert_eq!(
            listed.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![dinner.id, lunch.id, breakfast.id]
        );

        let paged = repo
            .list(&RecipeFilter {
                skip: 1,
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged[0].id, lunch.id);

        RecipeLists::new(&mut conn, RecipeList::Favorites)
            .add(bob.id, breakfast.id)
            .await
            .unwrap();
        let mut repo = Recipes::new(&mut conn);
        let favorited = RecipeFilter {
            favorited_by: Some(bob.id),
            limit: 10,
            ..Default::default()
        };
        let listed = repo.list(&favorited).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, breakfast.id);

        let in_cart = RecipeFilter {
            in_cart_of: Some(bob.id),
            limit: 10,
            ..Default::default()
        };
        assert_eq!(repo.count(&in_cart).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_previews_and_counts_for_authors(pool: PgPool) {
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let carol = create_test_user(&pool, "carol").await;
        let tags = seeded_tags(&pool).await;
        let flour = create_test_ingredients(&pool, &[("flour", "g")]).await[0].id;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Recipes::new(&mut conn);
        for name in ["One", "Two", "Three"] {
            repo.create(&recipe_create(alice.id, name, vec![tags[0].id], vec![(flour, 1)]))
                .await
                .unwrap();
        }
        repo.create(&recipe_create(bob.id, "Solo", vec![tags[0].id], vec![(flour, 1)]))
            .await
            .unwrap();

        let authors = [alice.id, bob.id, carol.id];
        let previews = repo.previews_for_authors(&authors, Some(2)).await.unwrap();
        let names: Vec<&str> = previews[&alice.id].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Three", "Two"]);
        assert_eq!(previews[&bob.id].len(), 1);
        assert!(!previews.contains_key(&carol.id));

        let unlimited = repo.previews_for_authors(&authors, None).await.unwrap();
        assert_eq!(unlimited[&alice.id].len(), 3);

        let counts = repo.count_for_authors(&authors).await.unwrap();
        assert_eq!(counts[&alice.id], 3);
        assert_eq!(counts[&bob.id], 1);
        assert_eq!(counts.get(&carol.id), None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cart_lines_cover_every_recipe_in_cart(pool: PgPool) {
        let cook = create_test_user(&pool, "cook").await;
        let tags = seeded_tags(&pool).await;
        let ingredients = create_test_ingredients(&pool, &[("flour", "g"), ("sugar", "g")]).await;
        let (flour, sugar) = (ingredients[0].id, ingredients[1].id);

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Recipes::new(&mut conn);
        let first = repo
            .create(&recipe_create(cook.id, "Cake", vec![tags[0].id], vec![(flour, 200), (sugar, 100)]))
            .await
            .unwrap();
        let second = repo
            .create(&recipe_create(cook.id, "Bread", vec![tags[0].id], vec![(flour, 300)]))
            .await
            .unwrap();
        repo.create(&recipe_create(cook.id, "Not in cart", vec![tags[0].id], vec![(sugar, 999)]))
            .await
            .unwrap();

        let mut cart = RecipeLists::new(&mut conn, RecipeList::ShoppingCart);
        cart.add(cook.id, first.id).await.unwrap();
        cart.add(cook.id, second.id).await.unwrap();

        let lines = Recipes::new(&mut conn).cart_lines(cook.id).await.unwrap();
        assert_eq!(lines.len(), 3);
        let flour_total: i64 = lines
            .iter()
            .filter(|l| l.ingredient_id == flour)
            .map(|l| i64::from(l.amount))
            .sum();
        assert_eq!(flour_total, 500);
    }
}
