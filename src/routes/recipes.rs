use warp::{
    http::{header, StatusCode},
    reject::Rejection,
    reply::with_header,
    Filter, Reply,
};

use crate::{
    actions::{
        lists::{add_to_list, remove_from_list, RecipeList},
        recipes::{
            create_recipe, delete_recipe, fetch_recipes, get_recipe, get_recipe_author,
            update_recipe,
        },
        shopping_list::download_shopping_list,
    },
    constants::{RECIPE_COUNT_PER_PAGE, SHOPPING_LIST_FILENAME},
    error::{Error, HtmlError},
    filters::{QueryPairs, RecipeFilter},
    form::{FormMode, RecipeForm},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{PageContext, PageRequest},
    permissions::{AccessPolicy, ActionType},
    schema::{Id, Recipe},
    state::{with_state, AppState},
};

use super::api::{json_body, no_content, reply_json, with_query};

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(handle_list);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handle_create);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_download_shopping_cart);

    let detail = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_detail);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handle_update);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(handle_delete);

    list.or(create)
        .or(download)
        .or(detail)
        .or(update)
        .or(delete)
        .or(list_routes("favorite", RecipeList::Favorites, state.clone()))
        .or(list_routes("shopping_cart", RecipeList::ShoppingCart, state))
}

/// `POST` and `DELETE /recipes/{id}/<name>` for one per-user list.
fn list_routes(
    name: &'static str,
    list: RecipeList,
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let add = warp::path("recipes")
        .and(warp::path::param::<Id>())
        .and(warp::path(name))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            handle_add_to_list(id, list, session, state)
        });

    let remove = warp::path("recipes")
        .and(warp::path::param::<Id>())
        .and(warp::path(name))
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            handle_remove_from_list(id, list, session, state)
        });

    add.or(remove)
}

async fn load_recipe(state: &AppState, viewer: Option<Id>, id: Id) -> Result<Recipe, Error> {
    get_recipe(&state.pool, &state.media, viewer, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())
}

/// Loads the author for the object-level check; unknown recipes are 404.
async fn authorize_author(state: &AppState, session: &SessionData, id: Id) -> Result<(), Error> {
    let author = get_recipe_author(&state.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    AccessPolicy::AuthorOrStaff.check(Some(session), Some(author))
}

async fn handle_list(
    session: Option<SessionData>,
    query: QueryPairs,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let filter = RecipeFilter::from_query(&query)?;
    let page = PageRequest::from_query(&query, RECIPE_COUNT_PER_PAGE)?;
    let viewer = session.map(|s| s.user_id);

    let (rows, total) = fetch_recipes(&state.pool, &state.media, viewer, &filter, page).await?;

    Ok(reply_json(
        &PageContext::from_rows(rows, total, page, "/api/recipes/", &query),
        StatusCode::OK,
    ))
}

async fn handle_create(
    session: SessionData,
    form: RecipeForm,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    let changes = form.validate(FormMode::Create)?;

    let data_uri = changes.image.as_deref().unwrap_or_default();
    let image = state.media.save_recipe_image(data_uri).await?;
    let id = match create_recipe(&state.pool, session.user_id, &changes, &image).await {
        Ok(id) => id,
        Err(e) => {
            state.media.delete(&image).await;
            return Err(e.into());
        }
    };

    let recipe = load_recipe(&state, Some(session.user_id), id).await?;
    Ok(reply_json(&recipe, StatusCode::CREATED))
}

async fn handle_detail(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = load_recipe(&state, session.map(|s| s.user_id), id).await?;

    Ok(reply_json(&recipe, StatusCode::OK))
}

async fn handle_update(
    id: Id,
    session: SessionData,
    form: RecipeForm,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    authorize_author(&state, &session, id).await?;
    let changes = form.validate(FormMode::Update)?;

    let image = match changes.image.as_deref() {
        Some(data_uri) => Some(state.media.save_recipe_image(data_uri).await?),
        None => None,
    };

    match update_recipe(&state.pool, id, &changes, image.as_deref()).await {
        Ok(Some(replaced)) => state.media.delete(&replaced).await,
        Ok(None) => {}
        Err(e) => {
            if let Some(image) = &image {
                state.media.delete(image).await;
            }
            return Err(e.into());
        }
    }
    log::info!("User {} updated recipe {id}", session.user_id);

    let recipe = load_recipe(&state, Some(session.user_id), id).await?;
    Ok(reply_json(&recipe, StatusCode::OK))
}

async fn handle_delete(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    authorize_author(&state, &session, id).await?;

    let image = delete_recipe(&state.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    if let Some(image) = image {
        state.media.delete(&image).await;
    }
    log::info!("User {} deleted recipe {id}", session.user_id);

    Ok(no_content())
}

async fn handle_add_to_list(
    id: Id,
    list: RecipeList,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    let recipe = add_to_list(&state.pool, &state.media, list, session.user_id, id).await?;

    Ok(reply_json(&recipe, StatusCode::CREATED))
}

async fn handle_remove_from_list(
    id: Id,
    list: RecipeList,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    remove_from_list(&state.pool, list, session.user_id, id).await?;

    Ok(no_content())
}

async fn handle_download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    let csv = download_shopping_list(&state.pool, session.user_id).await?;

    Ok(with_header(
        with_header(csv, header::CONTENT_TYPE, "text/csv; charset=utf-8"),
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    ))
}
