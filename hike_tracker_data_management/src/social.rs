use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{data_manager::generate_id, store::SOCIAL_DATA, CompletedHike, DataManager, DataManagerError, UserProfile};

const REQUEST_PREFIX: &str = "request:";
const FRIENDSHIP_PREFIX: &str = "friendship:";
const POST_PREFIX: &str = "post:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub request_id: String,
    /// uid of the sender
    pub from: String,
    pub from_name: String,
    /// username of the recipient
    pub to: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub user1: String,
    pub user2: String,
    pub since: DateTime<Utc>,
}

impl Friendship {
    fn other(&self, uid: &str) -> Option<&str> {
        if self.user1 == uid {
            Some(&self.user2)
        } else if self.user2 == uid {
            Some(&self.user1)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    pub post_id: String,
    pub user_id: String,
    pub username: String,
    pub hike: CompletedHike,
    pub image_id: Option<String>,
    /// uids
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

// Friendships are stored once per unordered pair
fn friendship_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{FRIENDSHIP_PREFIX}{first}:{second}")
}

impl DataManager {
    pub async fn send_friend_request(&self, to_username: &str) -> Result<FriendRequest, DataManagerError> {
        let current = self.require_current_user().await?;
        let to_username = to_username.trim();

        if to_username.is_empty() || to_username == current.username {
            return Err(DataManagerError::InvalidInput(format!("Cannot send a friend request to '{to_username}'")));
        }

        let request = FriendRequest {
            request_id: generate_id("req"),
            from: current.uid.clone(),
            from_name: current.username.clone(),
            to: to_username.to_string(),
            created_at: Utc::now(),
        };

        self.set_json(SOCIAL_DATA, &format!("{REQUEST_PREFIX}{}", request.request_id), &request).await?;
        tracing::info!("{} sent a friend request to {}", current.username, to_username);
        Ok(request)
    }

    /// Requests addressed to the current user.
    pub async fn incoming_friend_requests(&self) -> Result<Vec<FriendRequest>, DataManagerError> {
        let current = self.require_current_user().await?;
        let requests: Vec<FriendRequest> = self.values_with_prefix(SOCIAL_DATA, REQUEST_PREFIX).await?;
        Ok(requests.into_iter().filter(|r| r.to == current.username).collect())
    }

    pub async fn accept_friend_request(&self, request_id: &str) -> Result<Friendship, DataManagerError> {
        let current = self.require_current_user().await?;
        let key = format!("{REQUEST_PREFIX}{request_id}");

        let request: FriendRequest = self
            .get_json(SOCIAL_DATA, &key)
            .await?
            .ok_or_else(|| DataManagerError::NotFound(format!("No friend request with id {request_id}")))?;

        if request.to != current.username {
            return Err(DataManagerError::InvalidInput(format!("Friend request {request_id} is not addressed to {}", current.username)));
        }

        let friendship = Friendship {
            user1: request.from.clone(),
            user2: current.uid.clone(),
            since: Utc::now(),
        };

        self.set_json(SOCIAL_DATA, &friendship_key(&friendship.user1, &friendship.user2), &friendship).await?;
        self.store.remove(SOCIAL_DATA, &key).await?;

        tracing::info!("{} and {} are now friends", request.from_name, current.username);
        Ok(friendship)
    }

    pub async fn friend_ids(&self, uid: &str) -> Result<Vec<String>, DataManagerError> {
        let friendships: Vec<Friendship> = self.values_with_prefix(SOCIAL_DATA, FRIENDSHIP_PREFIX).await?;
        Ok(friendships.iter().filter_map(|f| f.other(uid)).map(str::to_string).collect())
    }

    /// Profiles of the current user's friends. Friends without a local profile are left out.
    pub async fn friends(&self) -> Result<Vec<UserProfile>, DataManagerError> {
        let current = self.require_current_user().await?;
        let mut friends = Vec::new();

        for uid in self.friend_ids(&current.uid).await? {
            match self.get_profile(&uid).await? {
                Some(profile) => friends.push(profile),
                None => tracing::debug!("Friend {uid} has no local profile"),
            }
        }

        Ok(friends)
    }

    /// Posts a saved hike to the feed, optionally with a photo.
    pub async fn share_hike(&self, hike_id: &str, image: Option<&[u8]>) -> Result<FeedPost, DataManagerError> {
        let current = self.require_current_user().await?;
        let hike = self.get_hike(hike_id).await?;

        let image_id = match image {
            Some(bytes) => Some(self.save_image(hike_id, bytes).await?.image_id),
            None => hike.details.image_id.clone(),
        };

        let post = FeedPost {
            post_id: generate_id("post"),
            user_id: current.uid,
            username: current.username,
            hike,
            image_id,
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: Utc::now(),
        };

        self.set_json(SOCIAL_DATA, &format!("{POST_PREFIX}{}", post.post_id), &post).await?;
        Ok(post)
    }

    /// Posts by the current user and their friends, newest first.
    pub async fn feed(&self) -> Result<Vec<FeedPost>, DataManagerError> {
        let current = self.require_current_user().await?;
        let friend_ids = self.friend_ids(&current.uid).await?;

        let posts: Vec<FeedPost> = self.values_with_prefix(SOCIAL_DATA, POST_PREFIX).await?;
        let mut posts = posts
            .into_iter()
            .filter(|post| post.user_id == current.uid || friend_ids.contains(&post.user_id))
            .collect::<Vec<_>>();

        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.post_id.cmp(&b.post_id)));
        Ok(posts)
    }

    /// Likes the post, or removes the like if the current user already liked it. Returns whether the post is liked now.
    pub async fn toggle_like(&self, post_id: &str) -> Result<bool, DataManagerError> {
        let current = self.require_current_user().await?;
        let mut post = self.get_post(post_id).await?;

        let liked = if let Some(i) = post.likes.iter().position(|uid| *uid == current.uid) {
            post.likes.remove(i);
            false
        } else {
            post.likes.push(current.uid);
            true
        };

        self.set_json(SOCIAL_DATA, &format!("{POST_PREFIX}{post_id}"), &post).await?;
        Ok(liked)
    }

    pub async fn add_comment(&self, post_id: &str, text: &str) -> Result<Comment, DataManagerError> {
        let current = self.require_current_user().await?;
        if text.trim().is_empty() {
            return Err(DataManagerError::InvalidInput("Comment must not be empty".to_string()));
        }

        let mut post = self.get_post(post_id).await?;
        let comment = Comment {
            comment_id: generate_id("comment"),
            user_id: current.uid,
            username: current.username,
            text: text.trim().to_string(),
            created_at: Utc::now(),
        };

        post.comments.push(comment.clone());
        self.set_json(SOCIAL_DATA, &format!("{POST_PREFIX}{post_id}"), &post).await?;
        Ok(comment)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<FeedPost, DataManagerError> {
        self.get_json(SOCIAL_DATA, &format!("{POST_PREFIX}{post_id}"))
            .await?
            .ok_or_else(|| DataManagerError::NotFound(format!("No post with id {post_id}")))
    }
}
