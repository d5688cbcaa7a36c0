//! Demo data a fresh (or unreadable) store starts from.

use std::collections::BTreeMap;
use chrono::{Duration, Utc};
use helpboard_core::{
    Availability, Message, MessageId, PaymentMethod, Task, TaskId, TaskStatus, User, UserId,
};

fn student(
    id: &str,
    name: &str,
    email: &str,
    description: &str,
    is_available: bool,
    unavailable_days: &[&str],
    rating: f64,
    rating_count: u32,
) -> User {
    User {
        id: UserId::from(id),
        email: email.to_string(),
        name: name.to_string(),
        is_student: true,
        description: Some(description.to_string()),
        rating: Some(rating),
        rating_count: Some(rating_count),
        availability: Some(Availability {
            is_available,
            unavailable_days: unavailable_days.iter().map(|d| d.to_string()).collect(),
        }),
    }
}

/// The demo elder and the seven demo students, keyed by id.
pub fn users() -> BTreeMap<UserId, User> {
    let list = vec![
        User {
            id: UserId::from("elder1"),
            email: "test.elder@example.com".to_string(),
            name: "Test Elder".to_string(),
            is_student: false,
            description: None,
            rating: None,
            rating_count: None,
            availability: None,
        },
        student(
            "student1",
            "Test Student",
            "test.student@example.com",
            "I am a reliable and hardworking high school student with experience in yard work and technology. I am passionate about helping my community and look forward to assisting you with your tasks!",
            true,
            &["saturday", "sunday"],
            4.8,
            12,
        ),
        student(
            "student2",
            "Samantha Lee",
            "samantha.lee@example.com",
            "Friendly and patient student available for companionship, pet care, and light housekeeping. I love animals and enjoy spending time with elders.",
            false,
            &[],
            4.9,
            25,
        ),
        student(
            "student3",
            "Michael Chen",
            "michael.chen@example.com",
            "Tech-savvy student who can help you with any computer or smartphone issues. I am also available for running errands.",
            true,
            &["wednesday"],
            4.7,
            18,
        ),
        student(
            "student4",
            "David Rodriguez",
            "david.rodriguez@example.com",
            "Eager to help with any outdoor tasks or heavy lifting. I am strong, responsible, and work well with my hands.",
            true,
            &["tuesday", "thursday"],
            4.6,
            15,
        ),
        student(
            "student5",
            "Emily White",
            "emily.white@example.com",
            "I love organizing and cleaning! Let me help you tidy up your space. I am meticulous and efficient.",
            true,
            &["monday", "friday"],
            4.9,
            22,
        ),
        student(
            "student6",
            "Jessica Brown",
            "jessica.brown@example.com",
            "Creative and artistic student. I can help with decorating, crafts, or wrapping presents. I have a good eye for detail.",
            true,
            &["saturday"],
            4.8,
            19,
        ),
        student(
            "student7",
            "Chris Green",
            "chris.green@example.com",
            "I am a musician and can offer music lessons (guitar/piano) or just play some music for entertainment.",
            true,
            &[],
            4.9,
            30,
        ),
    ];
    list.into_iter().map(|u| (u.id.clone(), u)).collect()
}

fn message(id: &str, sender: &str, text: &str, minutes_ago: i64) -> Message {
    Message {
        id: MessageId::from(id),
        text: text.to_string(),
        sender_id: UserId::from(sender),
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
    }
}

/// Three demo tasks: two already in progress, one open.
pub fn tasks() -> Vec<Task> {
    let today = Utc::now().date_naive();
    vec![
        Task {
            id: TaskId::from("1"),
            title: "Help planting my garden".to_string(),
            description: "I need some help digging and planting some new flowers in my garden bed. All tools will be provided. Just need an extra pair of hands for a couple of hours.".to_string(),
            service_type: "Yard Work".to_string(),
            location: "Sunnyvale, CA".to_string(),
            budget: 50.0,
            status: TaskStatus::InProgress,
            task_date: today,
            task_dates: vec![today],
            creator_id: UserId::from("elder1"),
            creator_name: "Test Elder".to_string(),
            applicant_id: Some(UserId::from("student2")),
            payment_method: PaymentMethod::Cash,
            is_paid: true,
            messages: vec![
                message("msg1", "student2", "Hi! Thanks for picking me. When is a good time to come by?", 15),
                message("msg2", "elder1", "How about tomorrow at 3pm?", 10),
            ],
        },
        Task {
            id: TaskId::from("2"),
            title: "Tech help with new Smart TV".to_string(),
            description: "I just bought a new television and I'm having trouble setting up the streaming apps like Netflix and Hulu. Would appreciate someone tech-savvy to walk me through it.".to_string(),
            service_type: "Technology Assistance".to_string(),
            location: "Mountain View, CA".to_string(),
            budget: 40.0,
            status: TaskStatus::InProgress,
            task_date: today,
            task_dates: vec![today],
            creator_id: UserId::from("elder1"),
            creator_name: "Test Elder".to_string(),
            applicant_id: Some(UserId::from("student1")),
            payment_method: PaymentMethod::App,
            is_paid: true,
            messages: vec![
                message("msg1", "elder1", "Hi, thanks for your interest. When would be a good time to come over?", 5),
                message("msg2", "student1", "I can come over tomorrow afternoon around 2 PM. Does that work for you?", 4),
            ],
        },
        Task {
            id: TaskId::from("3"),
            title: "Walk my dog twice a day".to_string(),
            description: "My golden retriever, Buddy, needs two walks a day while I'm recovering from a minor surgery. He's very friendly!".to_string(),
            service_type: "Pet Care".to_string(),
            location: "Palo Alto, CA".to_string(),
            budget: 20.0,
            status: TaskStatus::Open,
            task_date: today,
            task_dates: vec![today],
            creator_id: UserId::from("elder2"),
            creator_name: "John Smith".to_string(),
            applicant_id: None,
            payment_method: PaymentMethod::Cash,
            is_paid: true,
            messages: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_tasks_respect_assignment_invariant() {
        for task in tasks() {
            assert_eq!(task.status == TaskStatus::Open, task.applicant_id.is_none());
        }
    }

    #[test]
    fn seeded_users_include_demo_pair() {
        let users = users();
        assert!(!users[&UserId::from("elder1")].is_student);
        assert!(users[&UserId::from("student1")].is_student);
        assert_eq!(users.len(), 8);
    }
}
